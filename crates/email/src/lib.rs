pub mod html;
pub mod parser;
pub mod report;

pub use html::html_to_text;
pub use parser::ReportParser;
pub use report::{ParseError, ParsedCampaign, ParsedReport, Totals};

/// Parse a weekly report body with the default parser.
pub fn parse_email(body: &str) -> Result<ParsedReport, ParseError> {
    ReportParser::parse(body)
}
