//! `missing-tool` and `missing-data` reports
//!
//! Both types share one implementation parameterized by a [`MissingReportSpec`]:
//! the agent records what it lacked, the conclusion job counts the reports and
//! optionally files a tracking issue.

use std::collections::BTreeMap;

use super::{SafeOutput, SafeOutputKind, SafeOutputOptions};

/// Parameters of one missing-report type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MissingReportSpec {
    pub kind: SafeOutputKind,
    pub env_prefix: &'static str,
    pub default_title: &'static str,
    pub output_key: &'static str,
    /// Message type in the agent output stream
    pub message_type: &'static str,
}

pub const MISSING_TOOL: MissingReportSpec = MissingReportSpec {
    kind: SafeOutputKind::MissingTool,
    env_prefix: "GH_AW_MISSING_TOOL_",
    default_title: "Missing Tool Reported",
    output_key: "total_count",
    message_type: "missing_tool",
};

pub const MISSING_DATA: MissingReportSpec = MissingReportSpec {
    kind: SafeOutputKind::MissingData,
    env_prefix: "GH_AW_MISSING_DATA_",
    default_title: "Missing Data Reported",
    output_key: "total_count",
    message_type: "missing_data",
};

/// Runtime script shared by both report types
pub const REPORT_SCRIPT: &str = "report_missing.cjs";

impl MissingReportSpec {
    pub fn for_kind(kind: SafeOutputKind) -> Option<&'static MissingReportSpec> {
        match kind {
            SafeOutputKind::MissingTool => Some(&MISSING_TOOL),
            SafeOutputKind::MissingData => Some(&MISSING_DATA),
            _ => None,
        }
    }

    fn var(&self, name: &str) -> String {
        format!("{}{}", self.env_prefix, name)
    }

    /// Step env for the report handler
    pub fn env(&self, output: &SafeOutput) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(self.var("MAX"), output.effective_max().to_string());
        env.insert("GH_AW_MISSING_MESSAGE_TYPE".to_string(), self.message_type.to_string());
        if let SafeOutputOptions::Missing {
            create_issue,
            title_prefix,
            labels,
        } = &output.options
        {
            env.insert(self.var("CREATE_ISSUE"), create_issue.to_string());
            let title = match title_prefix {
                Some(prefix) => format!("{}{}", prefix, self.default_title),
                None => self.default_title.to_string(),
            };
            env.insert(self.var("ISSUE_TITLE"), title);
            if !labels.is_empty() {
                env.insert(self.var("LABELS"), labels.join(","));
            }
        }
        env
    }

    /// Step name in the conclusion job
    pub fn step_name(&self) -> &'static str {
        match self.kind {
            SafeOutputKind::MissingData => "Process missing data reports",
            _ => "Process missing tool reports",
        }
    }

    /// Step id in the conclusion job
    pub fn step_id(&self) -> &'static str {
        self.message_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::safe_outputs::SafeOutputsConfig;
    use serde_yaml::Mapping;

    fn output(yaml: &str, kind: SafeOutputKind) -> SafeOutput {
        let m: Mapping = serde_yaml::from_str(yaml).unwrap();
        let config = SafeOutputsConfig::from_mapping(&m, &mut Vec::new()).unwrap();
        config.get(kind).unwrap().clone()
    }

    #[test]
    fn tool_env_uses_its_prefix() {
        let o = output("missing-tool:\n  labels: [infra, agent]", SafeOutputKind::MissingTool);
        let env = MISSING_TOOL.env(&o);
        assert_eq!(env["GH_AW_MISSING_TOOL_MAX"], "20");
        assert_eq!(env["GH_AW_MISSING_TOOL_CREATE_ISSUE"], "true");
        assert_eq!(env["GH_AW_MISSING_TOOL_LABELS"], "infra,agent");
        assert_eq!(env["GH_AW_MISSING_TOOL_ISSUE_TITLE"], "Missing Tool Reported");
    }

    #[test]
    fn data_env_applies_title_prefix() {
        let o = output(
            "missing-data:\n  title-prefix: '[data] '\n  create-issue: false",
            SafeOutputKind::MissingData,
        );
        let env = MISSING_DATA.env(&o);
        assert_eq!(env["GH_AW_MISSING_DATA_ISSUE_TITLE"], "[data] Missing Data Reported");
        assert_eq!(env["GH_AW_MISSING_DATA_CREATE_ISSUE"], "false");
        assert!(!env.contains_key("GH_AW_MISSING_DATA_LABELS"));
    }

    #[test]
    fn lookup_by_kind() {
        assert_eq!(MissingReportSpec::for_kind(SafeOutputKind::MissingData), Some(&MISSING_DATA));
        assert_eq!(MissingReportSpec::for_kind(SafeOutputKind::Noop), None);
        assert_eq!(MISSING_TOOL.output_key, MISSING_DATA.output_key);
    }
}
