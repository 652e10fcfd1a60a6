//! Defensive XML tree access for TEI documents.
//!
//! GROBID output is inconsistent about namespaces: full documents declare the
//! TEI namespace, bare citation fragments usually do not. All element and
//! attribute matching here is therefore by local name (prefixes stripped), so
//! both flavors parse identically.
//!
//! Lookups use a tiny path syntax modeled on the subset of XPath that TEI
//! field extraction needs: `.//name` (any descendant), `./name` or `name`
//! (direct child), `/`-separated steps, and `[@attr="value"]` predicates.
//! Lookups never fail; absence is normal and yields `None` or `""`.

use quick_xml::Reader;
use quick_xml::events::Event;

/// A node in the element tree. Text nodes are kept in place between element
/// children so mixed content keeps its reading order.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element with local (prefix-stripped) name and attributes.
#[derive(Debug, Clone, Default)]
pub struct Element {
    pub name: String,
    attrs: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    /// Attribute value by local name, e.g. `xml:id` is found as `id`.
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Direct text content, trimmed. Text inside child elements is not
    /// included; use [`collect_text`] for full recursive text.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let Node::Text(t) = child {
                out.push_str(t);
            }
        }
        out.trim().to_string()
    }

    /// Direct child elements, in document order.
    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn has_element_children(&self) -> bool {
        self.child_elements().next().is_some()
    }

    /// All descendant elements in pre-order (self excluded).
    pub fn descendants(&self) -> Vec<&Element> {
        let mut out = Vec::new();
        for child in self.child_elements() {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }

    /// First element matching `path`, in document order.
    pub fn find(&self, path: &str) -> Option<&Element> {
        self.find_all(path).into_iter().next()
    }

    /// Every element matching `path`, in document order.
    pub fn find_all(&self, path: &str) -> Vec<&Element> {
        let (descendant, steps) = parse_path(path);
        let Some(first) = steps.first() else {
            return Vec::new();
        };
        let mut current: Vec<&Element> = if descendant {
            self.descendants()
                .into_iter()
                .filter(|e| first.matches(e))
                .collect()
        } else {
            self.child_elements().filter(|e| first.matches(e)).collect()
        };
        for step in &steps[1..] {
            current = current
                .iter()
                .flat_map(|e| e.child_elements().filter(|c| step.matches(c)))
                .collect();
        }
        current
    }
}

/// One path step: an element name plus zero or more attribute predicates.
#[derive(Debug)]
struct Step {
    name: String,
    attrs: Vec<(String, String)>,
}

impl Step {
    fn matches(&self, e: &Element) -> bool {
        e.name == self.name && self.attrs.iter().all(|(k, v)| e.attr(k) == Some(v))
    }
}

fn parse_path(path: &str) -> (bool, Vec<Step>) {
    let (descendant, rest) = if let Some(rest) = path.strip_prefix(".//") {
        (true, rest)
    } else if let Some(rest) = path.strip_prefix("./") {
        (false, rest)
    } else {
        (false, path)
    };
    let steps = rest.split('/').filter_map(parse_step).collect();
    (descendant, steps)
}

fn parse_step(segment: &str) -> Option<Step> {
    let mut parts = segment.split('[');
    let name = parts.next()?.trim();
    if name.is_empty() {
        return None;
    }
    let mut attrs = Vec::new();
    for pred in parts {
        // predicate form: @attr="value"] or @attr='value']
        let pred = pred.trim_end_matches(']');
        let Some(pred) = pred.strip_prefix('@') else {
            continue;
        };
        if let Some((key, value)) = pred.split_once('=') {
            let value = value.trim_matches(|c| c == '"' || c == '\'');
            attrs.push((key.to_string(), value.to_string()));
        }
    }
    Some(Step {
        name: name.to_string(),
        attrs,
    })
}

/// Text of the first descendant matching `path`, or the empty string if the
/// element is absent or nothing matches. Never fails; every biblio field
/// lookup funnels through here.
pub fn find_text(elem: Option<&Element>, path: &str) -> String {
    elem.and_then(|e| e.find(path))
        .map(|e| e.text())
        .unwrap_or_default()
}

/// All non-empty, whitespace-trimmed text fragments under `elem`, in reading
/// order. Mixed content like `hello <b>world</b>!` yields
/// `["hello", "world", "!"]`; whitespace-only runs are dropped.
pub fn collect_text(elem: Option<&Element>) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(elem) = elem {
        push_text(elem, &mut out);
    }
    out
}

fn push_text(elem: &Element, out: &mut Vec<String>) {
    for child in &elem.children {
        match child {
            Node::Text(t) => {
                let trimmed = t.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
            Node::Element(e) => push_text(e, out),
        }
    }
}

fn local_name(raw: &[u8]) -> String {
    let s = String::from_utf8_lossy(raw);
    match s.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => s.into_owned(),
    }
}

/// Parse a document into its root element. Returns `Ok(None)` when the input
/// contains no root element at all.
pub fn parse(input: &str) -> Result<Option<Element>, quick_xml::Error> {
    let mut reader = Reader::from_str(input);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                let elem = element_from_start(start.name().as_ref(), start.attributes());
                stack.push(elem);
            }
            Event::Empty(start) => {
                let elem = element_from_start(start.name().as_ref(), start.attributes());
                attach(elem, &mut stack, &mut root);
            }
            Event::End(_) => {
                if let Some(elem) = stack.pop() {
                    attach(elem, &mut stack, &mut root);
                }
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let value = text.unescape().unwrap_or_default().into_owned();
                    top.children.push(Node::Text(value));
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    let value = String::from_utf8_lossy(&data).into_owned();
                    top.children.push(Node::Text(value));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(root)
}

fn element_from_start(name: &[u8], attributes: quick_xml::events::attributes::Attributes) -> Element {
    let mut attrs = Vec::new();
    for attr in attributes.flatten() {
        // xmlns declarations would masquerade as regular attributes once
        // their prefix is stripped, so drop them outright.
        if attr.key.as_ref() == b"xmlns" || attr.key.as_ref().starts_with(b"xmlns:") {
            continue;
        }
        let key = local_name(attr.key.as_ref());
        let value = attr
            .unescape_value()
            .map(|v| v.into_owned())
            .unwrap_or_default();
        attrs.push((key, value));
    }
    Element {
        name: local_name(name),
        attrs,
        children: Vec::new(),
    }
}

fn attach(elem: Element, stack: &mut Vec<Element>, root: &mut Option<Element>) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(Node::Element(elem));
    } else if root.is_none() {
        *root = Some(elem);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn root(input: &str) -> Element {
        parse(input).unwrap().expect("root element")
    }

    #[test]
    fn collect_text_preserves_reading_order() {
        let e = root("<a>hello <b>world</b><b>...  </b>  !</a>");
        assert_eq!(
            collect_text(Some(&e)),
            vec!["hello", "world", "...", "!"]
        );
    }

    #[test]
    fn collect_text_of_none_is_empty() {
        assert!(collect_text(None).is_empty());
    }

    #[test]
    fn find_text_returns_empty_on_missing_match() {
        let e = root("<a><b>x</b></a>");
        assert_eq!(find_text(Some(&e), ".//c"), "");
        assert_eq!(find_text(None, ".//b"), "");
        assert_eq!(find_text(Some(&e), ".//b"), "x");
    }

    #[test]
    fn attribute_predicates_select_variants() {
        let e = root(
            r#"<bibl>
                 <title level="j">Nature</title>
                 <title level="j" type="abbrev">Nat.</title>
                 <title level="m">Some Book</title>
               </bibl>"#,
        );
        assert_eq!(find_text(Some(&e), r#".//title[@level="j"]"#), "Nature");
        assert_eq!(
            find_text(Some(&e), r#".//title[@level="j"][@type="abbrev"]"#),
            "Nat."
        );
        assert_eq!(find_text(Some(&e), r#".//title[@level="m"]"#), "Some Book");
    }

    #[test]
    fn namespaced_and_bare_elements_match_the_same_path() {
        let namespaced = root(
            r#"<tei:bibl xmlns:tei="http://www.tei-c.org/ns/1.0"><tei:idno type="DOI">10.1/x</tei:idno></tei:bibl>"#,
        );
        let bare = root(r#"<bibl><idno type="DOI">10.1/x</idno></bibl>"#);
        assert_eq!(find_text(Some(&namespaced), r#".//idno[@type="DOI"]"#), "10.1/x");
        assert_eq!(find_text(Some(&bare), r#".//idno[@type="DOI"]"#), "10.1/x");
    }

    #[test]
    fn xml_id_attribute_is_found_by_local_name() {
        let e = root(r#"<biblStruct xml:id="b12"/>"#);
        assert_eq!(e.attr("id"), Some("b12"));
    }

    #[test]
    fn child_paths_do_not_cross_levels() {
        let e = root("<a><b><c>deep</c></b></a>");
        assert_eq!(find_text(Some(&e), "./c"), "");
        assert_eq!(find_text(Some(&e), ".//c"), "deep");
        assert_eq!(find_text(Some(&e), ".//b/c"), "deep");
    }

    #[test]
    fn descendant_scan_is_document_order() {
        let e = root("<r><x><m>1</m></x><m>2</m><y><z><m>3</m></z></y></r>");
        let texts: Vec<String> = e.find_all(".//m").iter().map(|m| m.text()).collect();
        assert_eq!(texts, vec!["1", "2", "3"]);
    }

    #[test]
    fn empty_input_has_no_root() {
        assert!(parse("").unwrap().is_none());
        assert!(parse("   ").unwrap().is_none());
    }

    #[test]
    fn entities_are_unescaped() {
        let e = root("<a>AT&amp;T</a>");
        assert_eq!(e.text(), "AT&T");
    }
}
