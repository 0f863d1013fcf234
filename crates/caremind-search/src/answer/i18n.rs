//! Localized strings for generated answer text.

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output language of generated text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    #[default]
    Zh,
    En,
}

impl Lang {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zh => "zh",
            Self::En => "en",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lang {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zh" | "zh-cn" | "cn" | "中文" => Ok(Self::Zh),
            "en" | "en-us" | "english" => Ok(Self::En),
            other => bail!("unknown language '{other}' (expected zh or en)"),
        }
    }
}

/// Message keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg {
    HeaderDemo,
    HeaderDraft,
    Question,
    Drug,
    Evidence,
    NoEvidence,
    Note,
    DemoExplain,
    DemoEnable,
    DemoStepGuidelines,
    DemoStepDrugs,
    DemoStepEnv,
    Untitled,
    UnknownSource,
    SourceLabel,
    YearLabel,
}

/// Text of `msg` in `lang`.
#[must_use]
pub const fn text(lang: Lang, msg: Msg) -> &'static str {
    match lang {
        Lang::Zh => zh(msg),
        Lang::En => en(msg),
    }
}

const fn zh(msg: Msg) -> &'static str {
    match msg {
        Msg::HeaderDemo => "临床建议（演示）",
        Msg::HeaderDraft => "临床建议（草案）",
        Msg::Question => "问题",
        Msg::Drug => "药品",
        Msg::Evidence => "证据（选摘）",
        Msg::NoEvidence => "暂无证据片段。",
        Msg::Note => "合规提示：本工具仅供临床决策参考，不代替医生诊断与处方。",
        Msg::DemoExplain => "这是演示回退（检索后端在当前环境不可用）。",
        Msg::DemoEnable => "要启用完整检索：",
        Msg::DemoStepGuidelines => "1) 运行 `caremind index-guidelines` 建立指南向量索引；",
        Msg::DemoStepDrugs => "2) 运行 `caremind load-drugs` 导入药品表（可加 `--with-fts`）；",
        Msg::DemoStepEnv => {
            "3) 设置 CAREMIND_GUIDELINE_DB / CAREMIND_SQLITE_PATH 指向上述数据库，或在 caremind.toml 中配置。"
        }
        Msg::Untitled => "无标题",
        Msg::UnknownSource => "未知",
        Msg::SourceLabel => "来源：",
        Msg::YearLabel => "年份：",
    }
}

const fn en(msg: Msg) -> &'static str {
    match msg {
        Msg::HeaderDemo => "Clinical Advice (Demo)",
        Msg::HeaderDraft => "Clinical Advice (Draft)",
        Msg::Question => "Question",
        Msg::Drug => "Drug",
        Msg::Evidence => "Rationale / Evidence (selected)",
        Msg::NoEvidence => "No evidence snippets available.",
        Msg::Note => {
            "Compliance note: for clinical reference only; not a substitute for diagnosis/prescription."
        }
        Msg::DemoExplain => {
            "This is a demo fallback because the retrieval backend isn't available in this environment."
        }
        Msg::DemoEnable => "To enable full retrieval:",
        Msg::DemoStepGuidelines => "1) Run `caremind index-guidelines` to build the guideline index;",
        Msg::DemoStepDrugs => "2) Run `caremind load-drugs` to load the drug table (optionally `--with-fts`);",
        Msg::DemoStepEnv => {
            "3) Point CAREMIND_GUIDELINE_DB / CAREMIND_SQLITE_PATH at those databases, or set them in caremind.toml."
        }
        Msg::Untitled => "Untitled",
        Msg::UnknownSource => "Unknown",
        Msg::SourceLabel => "Source: ",
        Msg::YearLabel => "Year: ",
    }
}
