//! Top-level TEI document parsing.

use crate::biblio::parse_biblio;
use crate::xml::{self, Element, collect_text, find_text};
use crate::{Biblio, Document, STANDALONE_INDEX, TeiError};

/// Namespace declaration carried by full documents but usually missing from
/// bare citation fragments; stripped before parsing so both parse the same.
const TEI_NAMESPACE_DECL: &str = r#" xmlns="http://www.tei-c.org/ns/1.0""#;

/// Parse a full TEI document as returned by the fulltext and header
/// services.
///
/// Fails with [`TeiError::InvalidDocument`] when the root element, the
/// `teiHeader`, or the application annotation (version and timestamp) is
/// missing. These are all-or-nothing checks; there is no partial document.
pub fn parse_document(input: &[u8]) -> Result<Document, TeiError> {
    let text = std::str::from_utf8(input).map_err(|_| TeiError::InvalidDocument)?;
    let root = xml::parse(text)?.ok_or(TeiError::InvalidDocument)?;
    let header = root.find(".//teiHeader").ok_or(TeiError::InvalidDocument)?;
    let application = header
        .find(".//appInfo/application")
        .ok_or(TeiError::InvalidDocument)?;
    let (Some(version), Some(ts)) = (application.attr("version"), application.attr("when"))
    else {
        return Err(TeiError::InvalidDocument);
    };

    let mut doc = Document {
        grobid_version: version.trim().to_string(),
        grobid_ts: ts.trim().to_string(),
        header: parse_biblio(header),
        pdf_md5: find_text(Some(header), r#".//idno[@type="MD5"]"#),
        language_code: root
            .find(".//text")
            .and_then(|t| t.attr("lang"))
            .unwrap_or_default()
            .to_string(),
        ..Document::default()
    };

    for (i, node) in root.find_all(".//listBibl/biblStruct").into_iter().enumerate() {
        let mut citation = parse_biblio(node);
        citation.index = i as i32;
        doc.citations.push(citation);
    }

    doc.abstract_text = section_text(root.find(".//profileDesc/abstract"));
    doc.body = section_text(root.find(".//text/body"));
    doc.acknowledgement = section_text(root.find(r#".//back/div[@type="acknowledgement"]"#));
    doc.annex = section_text(root.find(r#".//back/div[@type="annex"]"#));

    tracing::debug!(
        version = %doc.grobid_version,
        citations = doc.citations.len(),
        "parsed TEI document"
    );
    Ok(doc)
}

fn section_text(elem: Option<&Element>) -> String {
    collect_text(elem).join(" ")
}

/// Parse a bare bibliography fragment, as returned by citation-only service
/// calls. Indices are assigned in document order starting at 0. A fragment
/// with no `biblStruct` at all yields an empty list, not an error.
pub fn parse_citation_list(input: &str) -> Result<Vec<Biblio>, TeiError> {
    let normalized = input.replace(TEI_NAMESPACE_DECL, "");
    let Some(root) = xml::parse(&normalized)? else {
        return Ok(Vec::new());
    };
    if root.name == "biblStruct" {
        let mut citation = parse_biblio(&root);
        citation.index = 0;
        return Ok(vec![citation]);
    }
    let mut citations = Vec::new();
    for (i, node) in root.find_all(".//biblStruct").into_iter().enumerate() {
        let mut citation = parse_biblio(node);
        citation.index = i as i32;
        citations.push(citation);
    }
    Ok(citations)
}

/// Parse a fragment expected to hold a single citation. The returned entry
/// carries the standalone index sentinel; zero-content entries come back as
/// `None`.
pub fn parse_citation(input: &str) -> Result<Option<Biblio>, TeiError> {
    let mut citations = parse_citation_list(input)?;
    if citations.is_empty() {
        return Ok(None);
    }
    let mut citation = citations.remove(0);
    citation.index = STANDALONE_INDEX;
    if citation.is_empty() {
        return Ok(None);
    }
    Ok(Some(citation))
}
