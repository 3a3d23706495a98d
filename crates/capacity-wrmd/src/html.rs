//! String-level HTML helpers for the WRMD list and detail views.
//!
//! Tag and attribute names are matched ASCII case-insensitively. The pages
//! are server-rendered with flat tables and forms, so no tree is built.

/// ASCII-lowercased copy; byte offsets stay valid against the original.
fn lower(s: &str) -> String {
    s.to_ascii_lowercase()
}

/// Byte offset of the next `<tag` opening (not `<tagfoo`) at or after `from`.
fn find_open_tag(lc: &str, tag: &str, from: usize) -> Option<usize> {
    let pat = format!("<{}", tag);
    let mut pos = from;
    while let Some(rel) = lc.get(pos..)?.find(&pat) {
        let start = pos + rel;
        match lc.as_bytes().get(start + pat.len()) {
            Some(b) if b.is_ascii_whitespace() || *b == b'>' || *b == b'/' => return Some(start),
            None => return None,
            _ => pos = start + pat.len(),
        }
    }
    None
}

/// One element located in a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    /// The opening tag, `<td class="x">`
    pub open: &'a str,
    /// Everything between the opening and closing tags
    pub inner: &'a str,
    /// Byte offset just past the element
    pub end: usize,
}

impl<'a> Element<'a> {
    /// Attribute value from the opening tag.
    pub fn attr(&self, name: &str) -> Option<String> {
        attr_value(self.open, name)
    }

    /// Whether the `class` attribute contains `class` as a whole word.
    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .map(|v| v.split_whitespace().any(|c| c.eq_ignore_ascii_case(class)))
            .unwrap_or(false)
    }

    /// Inner text with tags removed and whitespace collapsed.
    pub fn text(&self) -> String {
        text_content(self.inner)
    }
}

/// Next `<tag ...>...</tag>` element at or after `from`.
///
/// Nesting of the same tag is not tracked; the first closing tag ends the
/// element. Void elements (`<input ...>`) have an empty inner part.
pub fn next_element<'a>(s: &'a str, tag: &str, from: usize) -> Option<Element<'a>> {
    next_element_in(s, &lower(s), tag, from)
}

/// [`next_element`] against a precomputed lowercase copy of `s`.
fn next_element_in<'a>(s: &'a str, lc: &str, tag: &str, from: usize) -> Option<Element<'a>> {
    let start = find_open_tag(lc, tag, from)?;
    let open_end = s[start..].find('>')? + start + 1;
    let open = &s[start..open_end];

    let close = format!("</{}", tag);
    match lc[open_end..].find(&close) {
        Some(rel) if !is_void(tag) => {
            let close_start = open_end + rel;
            let end = s[close_start..].find('>').map(|i| close_start + i + 1).unwrap_or(s.len());
            Some(Element {
                open,
                inner: &s[open_end..close_start],
                end,
            })
        }
        _ => Some(Element {
            open,
            inner: "",
            end: open_end,
        }),
    }
}

/// All `tag` elements in order.
pub fn elements<'a>(s: &'a str, tag: &str) -> Vec<Element<'a>> {
    let lc = lower(s);
    let mut out = Vec::new();
    let mut pos = 0;
    while let Some(el) = next_element_in(s, &lc, tag, pos) {
        pos = el.end.max(pos + 1);
        out.push(el);
    }
    out
}

/// First `tag` element satisfying `pred`.
pub fn find_element<'a>(
    s: &'a str,
    tag: &str,
    pred: impl Fn(&Element<'a>) -> bool,
) -> Option<Element<'a>> {
    let lc = lower(s);
    let mut pos = 0;
    while let Some(el) = next_element_in(s, &lc, tag, pos) {
        if pred(&el) {
            return Some(el);
        }
        pos = el.end.max(pos + 1);
    }
    None
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "input" | "br" | "img" | "meta" | "link" | "hr")
}

/// Value of attribute `name` in an opening tag.
///
/// Quoted and bare values are accepted; a bare attribute (`selected`)
/// yields an empty string.
pub fn attr_value(open_tag: &str, name: &str) -> Option<String> {
    let body = open_tag
        .trim_start_matches('<')
        .trim_end_matches('>')
        .trim_end_matches('/');
    let tag_end = body
        .find(|c: char| c.is_ascii_whitespace())
        .unwrap_or(body.len());
    let mut rest = &body[tag_end..];

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            return None;
        }

        let key_end = rest
            .find(|c: char| c.is_ascii_whitespace() || c == '=')
            .unwrap_or(rest.len());
        let key = &rest[..key_end];
        rest = rest[key_end..].trim_start();

        let value = match rest.strip_prefix('=') {
            Some(after) => {
                let after = after.trim_start();
                match after.chars().next() {
                    Some(q @ ('"' | '\'')) => {
                        let quoted = &after[1..];
                        let close = quoted.find(q).unwrap_or(quoted.len());
                        rest = quoted.get(close + 1..).unwrap_or("");
                        &quoted[..close]
                    }
                    _ => {
                        let end = after
                            .find(|c: char| c.is_ascii_whitespace())
                            .unwrap_or(after.len());
                        rest = &after[end..];
                        &after[..end]
                    }
                }
            }
            None => "",
        };

        if key.eq_ignore_ascii_case(name) {
            return Some(decode_entities(value));
        }
    }
}

/// Whether the opening tag carries a (possibly bare) attribute.
pub fn has_attr(open_tag: &str, name: &str) -> bool {
    attr_value(open_tag, name).is_some()
}

/// Remove tags, decode entities and collapse whitespace.
pub fn text_content(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    collapse_ws(&decode_entities(&out))
}

/// Entities WRMD emits in table cells and option labels.
pub fn decode_entities(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&amp;", "&")
}

/// Collapse runs of whitespace to one space and trim.
pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_element_case_insensitive() {
        let html = r#"<DIV><Td Class="name">Red <b>Fox</b></TD><td>2</td></DIV>"#;
        let el = next_element(html, "td", 0).unwrap();
        assert_eq!(el.text(), "Red Fox");
        assert!(el.has_class("name"));

        let next = next_element(html, "td", el.end).unwrap();
        assert_eq!(next.text(), "2");
    }

    #[test]
    fn test_tag_prefix_not_matched() {
        let html = "<track src=x><tr><td>1</td></tr>";
        let rows = elements(html, "tr");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].text(), "1");
    }

    #[test]
    fn test_attr_value_forms() {
        let tag = r#"<option value='2' data-x=bare selected>"#;
        assert_eq!(attr_value(tag, "value").as_deref(), Some("2"));
        assert_eq!(attr_value(tag, "data-x").as_deref(), Some("bare"));
        assert_eq!(attr_value(tag, "selected").as_deref(), Some(""));
        assert_eq!(attr_value(tag, "missing"), None);

        let named = r#"<select class="form" name="exams[age_unit]">"#;
        assert_eq!(attr_value(named, "name").as_deref(), Some("exams[age_unit]"));
    }

    #[test]
    fn test_attr_name_needs_boundary() {
        let tag = r#"<input data-name="x" name="email">"#;
        assert_eq!(attr_value(tag, "name").as_deref(), Some("email"));
    }

    #[test]
    fn test_void_elements() {
        let html = r#"<form><input name="_token" value="abc"><input name="email"></form>"#;
        let inputs = elements(html, "input");
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].attr("value").as_deref(), Some("abc"));
    }

    #[test]
    fn test_elements_on_large_listing() {
        let row = "<tr><td>X</td><TD>Red Fox</TD></tr>";
        let html = format!("<table><tbody>{}</tbody></table>", row.repeat(5000));
        let rows = elements(&html, "tr");
        assert_eq!(rows.len(), 5000);
        assert_eq!(rows[4999].text(), "X Red Fox");

        let found = find_element(&html, "td", |td| td.text() == "Red Fox").unwrap();
        assert_eq!(found.open, "<TD>");
    }

    #[test]
    fn test_text_content_entities() {
        assert_eq!(text_content("  Big&nbsp;Brown <i>Bat</i>\n "), "Big Brown Bat");
        assert_eq!(text_content("Tom &amp; Jerry"), "Tom & Jerry");
    }
}
