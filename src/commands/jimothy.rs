//! `/jimothy` — requests a lane, beta/App Store build or arbitrary workflow.
//!
//! Only the request side exists: the invocation is parsed, validated and
//! acknowledged. Nothing is run yet.

use tracing::info;

use crate::slack::{
    Attachment, Command, CommandContext, CommandOption, Failure, Metadata, Response, SlackError,
    Visibility,
};

pub const NAME: &str = "jimothy";

pub const DEFAULT_BRANCH: &str = "develop";

const HELP: &str = "\
Invokes lane, beta or AppStore build or runs arbitrary workflow.

Parameters:
- name of the workflow or sub command to run
- list of workflow or sub command parameters in the fastlane format (e.g. `param:value`)
- `branch`: name of the branch to run the lane on. Default is `develop`

Example:
`/jimothy beta param:value branch:develop`";

pub fn command() -> Command {
    Command::new(NAME, HELP, run)
}

/// A parsed `/jimothy` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRequest {
    pub workflow: String,
    pub branch: String,
    pub version: Option<String>,
    /// Remaining `key:value` parameters, in order.
    pub params: Vec<(String, String)>,
}

impl WorkflowRequest {
    pub fn parse(metadata: &Metadata) -> Result<Self, SlackError> {
        let workflow = metadata
            .words()
            .first()
            .filter(|word| !word.contains(':'))
            .ok_or_else(|| SlackError::MissingParameter { key: "workflow".into() })?
            .clone();

        let branch = metadata
            .option(CommandOption::Branch)
            .filter(|b| !b.is_empty())
            .unwrap_or(DEFAULT_BRANCH)
            .to_string();

        let version = match metadata.option(CommandOption::Version) {
            Some(v) if is_dotted_version(v) => Some(v.to_string()),
            Some(v) => {
                return Err(SlackError::InvalidParameter {
                    key: CommandOption::Version.key().into(),
                    value: v.into(),
                    expected: "a dotted version such as `1.4.2`".into(),
                });
            }
            None => None,
        };

        let reserved = [CommandOption::Branch.key(), CommandOption::Version.key()];
        let params = metadata
            .words()
            .iter()
            .skip(1)
            .filter_map(|word| word.split_once(':'))
            .filter(|(key, _)| !reserved.contains(key))
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();

        Ok(Self { workflow, branch, version, params })
    }

    fn summary(&self) -> String {
        match &self.version {
            Some(version) => format!("`{}` {version} on `{}`", self.workflow, self.branch),
            None => format!("`{}` on `{}`", self.workflow, self.branch),
        }
    }
}

fn is_dotted_version(v: &str) -> bool {
    !v.is_empty()
        && v.split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

async fn run(metadata: Metadata, ctx: CommandContext) -> Result<Response, Failure> {
    let request = WorkflowRequest::parse(&metadata)?;
    info!(
        workflow = %request.workflow,
        branch = %request.branch,
        params = request.params.len(),
        channel = %metadata.channel_name(),
        "workflow requested"
    );

    let summary = request.summary();
    let now =
        Response::new(format!("Requesting {summary}…")).with_visibility(Visibility::InChannel);
    let later = async move {
        Ok(Response::new(format!("Request for {summary} accepted."))
            .with_visibility(Visibility::InChannel)
            .with_attachments(vec![Attachment::success(format!(
                "workflow: {}\nbranch: {}",
                request.workflow, request.branch
            ))]))
    };

    Ok(ctx.slack.reply_later(now, metadata.response_url(), later))
}
