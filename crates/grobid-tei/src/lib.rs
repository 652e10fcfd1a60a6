//! Structured document model for TEI-XML as produced by GROBID.
//!
//! GROBID returns TEI-XML; [`parse_document`] turns a full document into a
//! [`Document`], and [`parse_citation_list`] / [`parse_citation`] handle the
//! bare `biblStruct` fragments returned by citation-only service calls.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod biblio;
pub mod document;
pub mod xml;

pub use biblio::parse_biblio;
pub use document::{parse_citation, parse_citation_list, parse_document};
pub use xml::{collect_text, find_text};

/// Index value marking a standalone citation, i.e. one that was not part of
/// a citation list.
pub const STANDALONE_INDEX: i32 = -1;

#[derive(Error, Debug)]
pub enum TeiError {
    /// The document does not meet the minimal structural contract: well-formed
    /// XML, a root element, a `teiHeader`, and an `application` annotation
    /// carrying the GROBID version and timestamp.
    #[error("invalid document")]
    InvalidDocument,
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// One fully parsed source document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub grobid_version: String,
    pub grobid_ts: String,
    pub header: Biblio,
    /// MD5 of the original PDF, as annotated by GROBID in the TEI header.
    #[serde(rename = "pdfmd5", skip_serializing_if = "String::is_empty", default)]
    pub pdf_md5: String,
    #[serde(rename = "lang", skip_serializing_if = "String::is_empty", default)]
    pub language_code: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub citations: Vec<Biblio>,
    #[serde(
        rename = "abstract",
        skip_serializing_if = "String::is_empty",
        default
    )]
    pub abstract_text: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub body: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub acknowledgement: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub annex: String,
}

impl Document {
    /// Clear the bulk text sections to reduce storage size. The caller owns
    /// this decision; the parser never strips text on its own.
    pub fn remove_encumbered(&mut self) {
        self.abstract_text.clear();
        self.body.clear();
        self.acknowledgement.clear();
        self.annex.clear();
    }
}

/// One bibliographic entity: the parsed document's own header or one
/// citation entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Biblio {
    /// Position in the citation list, or [`STANDALONE_INDEX`].
    #[serde(default)]
    pub index: i32,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub unstructured: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub authors: Vec<Author>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub editors: Vec<Author>,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub date: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub book_title: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub series_title: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub journal: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub journal_abbrev: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub publisher: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub institution: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub issn: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub eissn: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub volume: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub issue: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub pages: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub first_page: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub last_page: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub note: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub doi: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub pmid: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub pmcid: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub arxiv_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub pii: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub ark: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub is_tex_id: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub url: String,
}

impl Biblio {
    /// True iff the entry carries no authors, no editors, and no descriptive
    /// or identifier content. Used to discard zero-content entries produced
    /// by defensive parsing of malformed XML.
    pub fn is_empty(&self) -> bool {
        if !self.authors.is_empty() || !self.editors.is_empty() {
            return false;
        }
        [
            &self.unstructured,
            &self.date,
            &self.title,
            &self.book_title,
            &self.series_title,
            &self.journal,
            &self.journal_abbrev,
            &self.publisher,
            &self.institution,
            &self.issn,
            &self.eissn,
            &self.volume,
            &self.issue,
            &self.pages,
            &self.first_page,
            &self.last_page,
            &self.note,
            &self.doi,
            &self.pmid,
            &self.pmcid,
            &self.arxiv_id,
            &self.pii,
            &self.ark,
            &self.is_tex_id,
            &self.url,
        ]
        .iter()
        .all(|s| s.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    /// Whitespace-normalized concatenation of all text under the name node.
    /// Name markup does not always decompose into forename/surname tags, so
    /// this is the only field guaranteed to carry the whole name.
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub full_name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub given_name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub middle_name: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub surname: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub email: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub orcid: String,
    #[serde(rename = "aff", skip_serializing_if = "Option::is_none", default)]
    pub affiliation: Option<Affiliation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Affiliation {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub institution: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub department: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub laboratory: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub address: Option<Address>,
}

impl Affiliation {
    pub fn is_empty(&self) -> bool {
        self.institution.is_empty()
            && self.department.is_empty()
            && self.laboratory.is_empty()
            && self.address.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub addr_line: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub post_code: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub settlement: String,
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub country: String,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.addr_line.is_empty()
            && self.post_code.is_empty()
            && self.settlement.is_empty()
            && self.country.is_empty()
    }
}
