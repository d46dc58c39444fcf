//! Prompt construction.
//!
//! The user prompt takes one of four shapes depending on whether the reader
//! has borrow history and whether a keyword was given. Every shape names
//! the exact number of books wanted.

use lectern_core::RecentBook;

/// Instructions shared by every request.
pub const SYSTEM_PROMPT: &str = r#"你是一位经验丰富的图书管理员，精通图书推荐和阅读指导。
根据用户提供的阅读历史或关键词，推荐相关领域的优质书籍。
推荐时综合考虑相关性、书籍质量、权威性和实用价值，所推荐的书籍必须真实存在，不得虚构。
只输出推荐书目，不要输出推理过程、解释、问候或任何额外文字。输出必须是如下格式的 JSON 数组：
[
    {"title": "书名", "author": "作者", "introduction": "五十字以内的简介", "reason": "推荐理由"}
]"#;

/// Which user prompt shape applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptBranch {
    HistoryAndKeyword,
    HistoryOnly,
    KeywordOnly,
    General,
}

impl PromptBranch {
    pub fn select(has_history: bool, has_keyword: bool) -> Self {
        match (has_history, has_keyword) {
            (true, true) => PromptBranch::HistoryAndKeyword,
            (true, false) => PromptBranch::HistoryOnly,
            (false, true) => PromptBranch::KeywordOnly,
            (false, false) => PromptBranch::General,
        }
    }
}

fn history_lines(recent: &[RecentBook]) -> String {
    recent
        .iter()
        .map(|b| format!("- 《{}》（{}）", b.title, b.author))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the user prompt for `limit` books. A blank `keyword` counts as none.
pub fn user_prompt(recent: &[RecentBook], keyword: &str, limit: u32) -> String {
    let keyword = keyword.trim();
    let count_rule = format!("请严格按照 {limit} 本的数量进行推荐，只输出 JSON 数组。");

    match PromptBranch::select(!recent.is_empty(), !keyword.is_empty()) {
        PromptBranch::HistoryAndKeyword => format!(
            "我最近阅读了以下书籍:\n{}\n现在我对关键词含有 \"{keyword}\" 的书籍感兴趣，请结合我的阅读历史和这个关键词，为我推荐 {limit} 本相关书籍。{count_rule}",
            history_lines(recent)
        ),
        PromptBranch::HistoryOnly => format!(
            "我最近阅读了以下书籍:\n{}\n请根据我的阅读历史，为我推荐 {limit} 本可能感兴趣的新书。{count_rule}",
            history_lines(recent)
        ),
        PromptBranch::KeywordOnly => format!(
            "我对关键词 \"{keyword}\" 感兴趣，请为我推荐 {limit} 本相关的优质书籍。{count_rule}"
        ),
        PromptBranch::General => format!("请为我推荐 {limit} 本优质的书籍。{count_rule}"),
    }
}
