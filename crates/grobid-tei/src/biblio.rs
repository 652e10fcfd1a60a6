//! Bibliographic structure parsing.
//!
//! A `biblStruct` citation node and a document's `teiHeader` share enough
//! shape that one parser covers both. Every field is independently optional;
//! a malformed or missing substructure degrades to an empty field, never to
//! a parse failure.

use crate::xml::{Element, collect_text, find_text};
use crate::{Address, Affiliation, Author, Biblio};

/// Parse one bibliographic node (a `biblStruct` or the document header) into
/// a [`Biblio`]. Pure function of the subtree; `index` is left at its
/// default and assigned by the caller.
pub fn parse_biblio(elem: &Element) -> Biblio {
    let mut authors = Vec::new();
    for node in elem.find_all(".//author") {
        if let Some(author) = parse_author(node) {
            authors.push(author);
        }
    }

    // Editors come from two distinct sources: dedicated editor tags and
    // contributor tags carrying an editor role.
    let mut editors = Vec::new();
    for node in elem.find_all(".//editor") {
        editors.extend(parse_editor(node));
    }
    for node in elem.find_all(r#".//contributor[@role="editor"]"#) {
        editors.extend(parse_editor(node));
    }

    let mut biblio = Biblio {
        authors,
        editors,
        id: elem.attr("id").unwrap_or_default().to_string(),
        unstructured: find_text(Some(elem), r#".//note[@type="raw_reference"]"#),
        date: parse_date(elem),
        title: find_text(Some(elem), r#".//title[@type="main"]"#),
        book_title: find_text(Some(elem), r#".//title[@level="m"]"#),
        series_title: find_text(Some(elem), r#".//title[@level="s"]"#),
        journal: find_text(Some(elem), r#".//title[@level="j"]"#),
        journal_abbrev: find_text(Some(elem), r#".//title[@level="j"][@type="abbrev"]"#),
        publisher: parse_publisher(elem),
        institution: find_text(Some(elem), ".//respStmt/orgName"),
        volume: find_text(Some(elem), r#".//biblScope[@unit="volume"]"#),
        issue: find_text(Some(elem), r#".//biblScope[@unit="issue"]"#),
        note: parse_plain_note(elem),
        doi: find_text(Some(elem), r#".//idno[@type="DOI"]"#),
        pmid: find_text(Some(elem), r#".//idno[@type="PMID"]"#),
        pmcid: find_text(Some(elem), r#".//idno[@type="PMCID"]"#),
        arxiv_id: find_text(Some(elem), r#".//idno[@type="arXiv"]"#),
        pii: find_text(Some(elem), r#".//idno[@type="PII"]"#),
        ark: find_text(Some(elem), r#".//idno[@type="ark"]"#),
        is_tex_id: find_text(Some(elem), r#".//idno[@type="istexId"]"#),
        issn: find_text(Some(elem), r#".//idno[@type="ISSN"]"#),
        eissn: find_text(Some(elem), r#".//idno[@type="eISSN"]"#),
        url: clean_url(
            elem.find(".//ptr")
                .and_then(|p| p.attr("target"))
                .unwrap_or_default(),
        ),
        ..Biblio::default()
    };

    parse_pages(elem, &mut biblio);

    if let Some(stripped) = biblio.arxiv_id.strip_prefix("arXiv:") {
        biblio.arxiv_id = stripped.to_string();
    }
    // A ptr target that merely redirects through doi.org carries no
    // information beyond the DOI itself.
    if !biblio.doi.is_empty() && biblio.url.contains("doi.org") {
        biblio.url.clear();
    }
    // Promote a book title when no article-level title exists, so an entry
    // never has an empty title next to a populated book title.
    if biblio.title.is_empty() && !biblio.book_title.is_empty() {
        biblio.title = std::mem::take(&mut biblio.book_title);
    }

    biblio
}

/// A `from`/`to` attribute pair wins over the raw element text.
fn parse_pages(elem: &Element, biblio: &mut Biblio) {
    let Some(scope) = elem.find(r#".//biblScope[@unit="page"]"#) else {
        return;
    };
    let from = scope.attr("from").unwrap_or_default().trim().to_string();
    let to = scope.attr("to").unwrap_or_default().trim().to_string();
    if !from.is_empty() && !to.is_empty() {
        biblio.pages = format!("{from}-{to}");
        biblio.first_page = from;
        biblio.last_page = to;
    } else {
        if !from.is_empty() {
            biblio.first_page = from;
        }
        biblio.pages = scope.text();
    }
}

fn parse_date(elem: &Element) -> String {
    let Some(date) = elem.find(r#".//date[@type="published"]"#) else {
        return String::new();
    };
    match date.attr("when") {
        Some(when) if !when.trim().is_empty() => when.trim().to_string(),
        _ => date.text(),
    }
}

/// Headers carry the publisher under `publicationStmt`, citations under the
/// monograph imprint.
fn parse_publisher(elem: &Element) -> String {
    let publisher = find_text(Some(elem), ".//imprint/publisher");
    if !publisher.is_empty() {
        return publisher;
    }
    find_text(Some(elem), ".//publicationStmt/publisher")
}

/// First plain `note`, skipping typed notes so this never aliases the
/// raw_reference note.
fn parse_plain_note(elem: &Element) -> String {
    elem.find_all(".//note")
        .into_iter()
        .find(|n| n.attr("type").is_none())
        .map(|n| n.text())
        .unwrap_or_default()
}

/// Parse a single author tag. Authors appear in document headers and in
/// citations; a structured `persName` child is required.
fn parse_author(elem: &Element) -> Option<Author> {
    let pers_name = elem.find("./persName")?;
    let mut author = parse_pers_name(pers_name);
    author.orcid = find_text(Some(elem), r#"./idno[@type="ORCID"]"#);
    author.email = find_text(Some(elem), "./email");
    if let Some(affiliation) = elem.find("./affiliation") {
        author.affiliation = parse_affiliation(affiliation);
    }
    Some(author)
}

/// An editor tag may contain several structured names, or only a bare text
/// run directly under the tag.
fn parse_editor(elem: &Element) -> Vec<Author> {
    let pers_names = elem.find_all("./persName");
    if pers_names.is_empty() {
        if !elem.has_element_children() {
            let trimmed = elem.text();
            if trimmed.len() > 2 {
                return vec![Author {
                    full_name: trimmed,
                    ..Author::default()
                }];
            }
        }
        return Vec::new();
    }
    pers_names.into_iter().map(parse_pers_name).collect()
}

fn parse_pers_name(elem: &Element) -> Author {
    Author {
        full_name: collect_text(Some(elem)).join(" "),
        given_name: find_text(Some(elem), r#"./forename[@type="first"]"#),
        middle_name: find_text(Some(elem), r#"./forename[@type="middle"]"#),
        surname: find_text(Some(elem), "./surname"),
        ..Author::default()
    }
}

fn parse_affiliation(elem: &Element) -> Option<Affiliation> {
    let mut affiliation = Affiliation::default();
    for org in elem.find_all("./orgName") {
        match org.attr("type") {
            Some("institution") => affiliation.institution = org.text(),
            Some("department") => affiliation.department = org.text(),
            Some("laboratory") => affiliation.laboratory = org.text(),
            _ => {}
        }
    }
    if let Some(address) = elem.find("./address") {
        let address = Address {
            addr_line: find_text(Some(address), "./addrLine"),
            post_code: find_text(Some(address), "./postCode"),
            settlement: find_text(Some(address), "./settlement"),
            country: find_text(Some(address), "./country"),
        };
        if !address.is_empty() {
            affiliation.address = Some(address);
        }
    }
    if affiliation.is_empty() {
        return None;
    }
    Some(affiliation)
}

/// Normalize URLs scraped out of citation text, which often carry angle
/// brackets or a trailing "Lastaccessed" fragment.
pub fn clean_url(url: &str) -> String {
    let mut url = url.trim().to_string();
    if url.is_empty() {
        return url;
    }
    if let Some(stripped) = url.strip_suffix(".Lastaccessed") {
        url = stripped.to_string();
    }
    if let Some(stripped) = url.strip_prefix('<') {
        url = stripped.to_string();
    }
    if let Some((head, _)) = url.split_once('>') {
        url = head.to_string();
    }
    url
}
