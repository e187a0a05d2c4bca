pub mod summarize_content;

pub use summarize_content::{
    fallback_summary, parse_summary_reply, summarize_content, ParsedSummary, SummaryBudget,
};
