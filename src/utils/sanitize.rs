use ammonia::Builder;

// Keeps inline formatting only; every other tag is stripped before the
// text is stored or relayed to the messaging service.
pub fn sanitize_text(input: &str) -> String {
    let mut builder = Builder::empty();
    builder.add_tags(&["b", "strong", "i", "em", "br"]);
    builder.clean(input).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(sanitize_text("deliver by friday"), "deliver by friday");
    }

    #[test]
    fn scripts_are_removed_with_their_content() {
        assert_eq!(sanitize_text("<script>alert(1)</script>ok"), "ok");
    }

    #[test]
    fn inline_formatting_survives() {
        assert_eq!(
            sanitize_text("<b>urgent</b> job, <a href=\"http://x\">link</a>"),
            "<b>urgent</b> job, link"
        );
    }
}
