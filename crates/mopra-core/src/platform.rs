/// External AI backends the online-search proxy can route to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchPlatform {
    #[default]
    ChatGpt,
    Claude,
    Gemini,
    Copilot,
    DeepSeek,
}

impl SearchPlatform {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPlatform::ChatGpt => "chatgpt",
            SearchPlatform::Claude => "claude",
            SearchPlatform::Gemini => "gemini",
            SearchPlatform::Copilot => "copilot",
            SearchPlatform::DeepSeek => "deepseek",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "chatgpt" => Some(SearchPlatform::ChatGpt),
            "claude" => Some(SearchPlatform::Claude),
            "gemini" => Some(SearchPlatform::Gemini),
            "copilot" => Some(SearchPlatform::Copilot),
            "deepseek" => Some(SearchPlatform::DeepSeek),
            _ => None,
        }
    }

    pub fn all() -> Vec<SearchPlatform> {
        vec![
            SearchPlatform::ChatGpt,
            SearchPlatform::Claude,
            SearchPlatform::Gemini,
            SearchPlatform::Copilot,
            SearchPlatform::DeepSeek,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SearchPlatform::ChatGpt => "ChatGPT",
            SearchPlatform::Claude => "Claude",
            SearchPlatform::Gemini => "Gemini",
            SearchPlatform::Copilot => "Copilot",
            SearchPlatform::DeepSeek => "DeepSeek",
        }
    }

    /// The platform after this one, wrapping around.
    pub fn next(&self) -> Self {
        let all = Self::all();
        let idx = all.iter().position(|p| p == self).unwrap_or(0);
        all[(idx + 1) % all.len()]
    }
}
