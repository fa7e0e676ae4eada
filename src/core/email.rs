use crate::utils::error::Result;
use mailparse::ParsedMail;

/// Returns the body text the model should see: the first `text/plain` part in
/// document order for multipart mail, otherwise the outer message body.
pub fn extract_body(raw: &[u8]) -> Result<String> {
    let mail = mailparse::parse_mail(raw)?;

    if !mail.subparts.is_empty() {
        if let Some(part) = first_plain_text(&mail) {
            tracing::debug!("Using text/plain part ({} parts total)", count_parts(&mail));
            return Ok(part.get_body()?);
        }
        tracing::debug!("No text/plain part found, falling back to outer body");
    }

    Ok(mail.get_body()?)
}

fn is_plain_text(part: &ParsedMail<'_>) -> bool {
    part.ctype.mimetype.eq_ignore_ascii_case("text/plain")
}

// 深度優先、文件順序，與郵件客戶端顯示順序一致
fn first_plain_text<'b, 'a>(part: &'b ParsedMail<'a>) -> Option<&'b ParsedMail<'a>> {
    if is_plain_text(part) {
        return Some(part);
    }
    part.subparts.iter().find_map(first_plain_text)
}

fn count_parts(part: &ParsedMail<'_>) -> usize {
    1 + part.subparts.iter().map(count_parts).sum::<usize>()
}
