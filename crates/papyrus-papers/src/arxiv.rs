//! arXiv Atom API client.

use quick_xml::Reader;
use quick_xml::events::attributes::Attributes;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use url::Url;

use crate::error::SourceError;
use crate::pdf::{self, DEFAULT_MAX_PDF_BYTES};
use crate::record::PaperRecord;
use crate::source::{BoxFuture, PaperSource};
use crate::validate::is_arxiv_id;

pub const DEFAULT_BASE_URL: &str = "http://export.arxiv.org/api";
pub const NAMESPACE: &str = "arxiv";

const MAX_RETRIES: u32 = 2;
const ERROR_ID_MARKER: &str = "/api/errors";

#[derive(Debug, Clone)]
pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    full_text: bool,
    max_pdf_bytes: usize,
}

impl Default for ArxivClient {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ArxivClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: papyrus_llm::http::default_client(),
            base_url,
            full_text: false,
            max_pdf_bytes: DEFAULT_MAX_PDF_BYTES,
        }
    }

    /// Attach the PDF text to records returned by `fetch`.
    #[must_use]
    pub fn with_full_text(mut self, enabled: bool) -> Self {
        self.full_text = enabled;
        self
    }

    #[must_use]
    pub fn with_max_pdf_bytes(mut self, max: usize) -> Self {
        self.max_pdf_bytes = max;
        self
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn query(&self, params: &[(&str, String)]) -> Result<Vec<PaperRecord>, SourceError> {
        let mut url = Url::parse(&format!("{}/query", self.base_url))
            .map_err(|e| SourceError::Parse(format!("invalid arXiv base url: {e}")))?;
        url.query_pairs_mut()
            .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));

        tracing::debug!("arXiv request: {url}");
        let response =
            papyrus_llm::retry::send_with_retry("arxiv", MAX_RETRIES, || {
                self.client.get(url.clone()).send()
            })
            .await?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!("arXiv API error {status}");
            return Err(SourceError::Status {
                provider: NAMESPACE.into(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        parse_atom_feed(&body)
    }

    async fn download_text(&self, pdf_url: &str) -> Result<String, SourceError> {
        tracing::debug!("downloading PDF {pdf_url}");
        let response = papyrus_llm::retry::send_with_retry("arxiv", MAX_RETRIES, || {
            self.client.get(pdf_url).send()
        })
        .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                provider: NAMESPACE.into(),
                status: status.as_u16(),
            });
        }
        let announced = response
            .content_length()
            .map(|len| usize::try_from(len).unwrap_or(usize::MAX));
        if let Some(len) = announced
            && len > self.max_pdf_bytes
        {
            return Err(SourceError::PdfTooLarge(len));
        }
        let bytes = response.bytes().await?;
        if bytes.len() > self.max_pdf_bytes {
            return Err(SourceError::PdfTooLarge(bytes.len()));
        }
        pdf::extract_text(bytes.to_vec()).await
    }

    /// Fill `full_text` from the PDF link; on failure the record keeps its abstract.
    async fn attach_full_text(&self, record: &mut PaperRecord) {
        let Some(pdf_url) = record.pdf_url.clone() else {
            return;
        };
        match self.download_text(&pdf_url).await {
            Ok(text) => {
                tracing::info!("extracted {} chars of full text for {}", text.len(), record.id);
                record.full_text = Some(text);
            }
            Err(e) => tracing::warn!("full text unavailable for {}: {e}", record.id),
        }
    }
}

impl PaperSource for ArxivClient {
    fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> BoxFuture<'_, Result<Vec<PaperRecord>, SourceError>> {
        let params = vec![
            ("search_query", format!("all:{query}")),
            ("start", "0".to_string()),
            ("max_results", max_results.to_string()),
        ];
        Box::pin(async move {
            let mut papers = self.query(&params).await?;
            papers.truncate(max_results);
            Ok(papers)
        })
    }

    fn fetch(&self, id: &str) -> BoxFuture<'_, Result<Option<PaperRecord>, SourceError>> {
        let params = vec![("id_list", id.to_string())];
        Box::pin(async move {
            let Some(mut record) = self.query(&params).await?.into_iter().next() else {
                return Ok(None);
            };
            if self.full_text {
                self.attach_full_text(&mut record).await;
            }
            Ok(Some(record))
        })
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "arxiv"
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn namespace(&self) -> &str {
        NAMESPACE
    }

    fn is_valid_id(&self, bare_id: &str) -> bool {
        is_arxiv_id(bare_id)
    }
}

#[derive(Default)]
struct EntryAccum {
    id: String,
    title: String,
    summary: String,
    published: String,
    authors: Vec<String>,
    pdf_url: Option<String>,
}

impl EntryAccum {
    fn push_text(&mut self, tag: &str, text: &str, in_author: bool) {
        match tag {
            "id" => self.id.push_str(text),
            "title" => self.title.push_str(text),
            "summary" => self.summary.push_str(text),
            "published" => self.published.push_str(text),
            "name" if in_author => {
                let name = normalize_whitespace(text);
                if !name.is_empty() {
                    self.authors.push(name);
                }
            }
            _ => {}
        }
    }

    fn into_record(self) -> Option<PaperRecord> {
        let raw_id = self.id.trim();
        let title = normalize_whitespace(&self.title);
        if raw_id.is_empty() || raw_id.contains(ERROR_ID_MARKER) || title.is_empty() {
            return None;
        }
        let bare = extract_arxiv_id(raw_id);
        let summary = normalize_whitespace(&self.summary);
        let published = published_date(&self.published);

        Some(PaperRecord {
            id: format!("{NAMESPACE}:{bare}"),
            title,
            authors: self.authors,
            published,
            summary: (!summary.is_empty()).then_some(summary),
            full_text: None,
            pdf_url: self.pdf_url,
            source: NAMESPACE.into(),
        })
    }
}

/// `YYYY-MM-DD` from an Atom timestamp; non-RFC 3339 values keep their date part.
fn published_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match chrono::DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => Some(ts.date_naive().to_string()),
        Err(e) => {
            tracing::debug!("unparseable arXiv timestamp '{raw}': {e}");
            raw.split('T').next().map(str::to_string)
        }
    }
}

fn extract_pdf_href(attrs: Attributes<'_>) -> Option<String> {
    let mut href = String::new();
    let mut is_pdf = false;
    for attr in attrs.flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref());
        let val = String::from_utf8_lossy(&attr.value);
        if key == "title" && val == "pdf" {
            is_pdf = true;
        }
        if key == "href" {
            href = val.to_string();
        }
    }
    (is_pdf && !href.is_empty()).then_some(href)
}

#[derive(Default)]
struct AtomParser {
    records: Vec<PaperRecord>,
    accum: EntryAccum,
    current_tag: String,
    in_entry: bool,
    in_author: bool,
}

impl AtomParser {
    fn handle_start(&mut self, e: &BytesStart<'_>) {
        let tag = String::from_utf8_lossy(e.name().as_ref()).to_string();
        match tag.as_str() {
            "entry" => {
                self.in_entry = true;
                self.accum = EntryAccum::default();
            }
            "author" if self.in_entry => self.in_author = true,
            "link" if self.in_entry => self.take_link(e),
            _ if self.in_entry => self.current_tag = tag,
            _ => {}
        }
    }

    fn handle_empty(&mut self, e: &BytesStart<'_>) {
        if self.in_entry && e.name().as_ref() == b"link" {
            self.take_link(e);
        }
    }

    fn take_link(&mut self, e: &BytesStart<'_>) {
        if let Some(href) = extract_pdf_href(e.attributes()) {
            self.accum.pdf_url = Some(href);
        }
    }

    fn handle_text(&mut self, e: &BytesText<'_>) -> Result<(), SourceError> {
        if !self.in_entry {
            return Ok(());
        }
        let text = e
            .unescape()
            .map_err(|err| SourceError::Parse(err.to_string()))?;
        self.accum.push_text(&self.current_tag, &text, self.in_author);
        Ok(())
    }

    fn handle_end(&mut self, e: &BytesEnd<'_>) {
        match e.name().as_ref() {
            b"entry" => {
                let finished = std::mem::take(&mut self.accum);
                if let Some(record) = finished.into_record() {
                    self.records.push(record);
                }
                self.in_entry = false;
                self.current_tag.clear();
            }
            b"author" => self.in_author = false,
            _ => self.current_tag.clear(),
        }
    }
}

/// Parse an arXiv Atom feed into records in document order.
///
/// Error entries and entries without a title are skipped.
///
/// # Errors
///
/// Returns [`SourceError::Parse`] if the XML is malformed.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<PaperRecord>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut parser = AtomParser::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => parser.handle_start(e),
            Ok(Event::Empty(ref e)) => parser.handle_empty(e),
            Ok(Event::Text(ref e)) => parser.handle_text(e)?,
            Ok(Event::End(ref e)) => parser.handle_end(e),
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::Parse(format!(
                    "at position {}: {e}",
                    reader.error_position()
                )));
            }
            _ => {}
        }
    }

    Ok(parser.records)
}

/// `http://arxiv.org/abs/2301.12345v2` → `2301.12345`; old-style ids keep their archive.
fn extract_arxiv_id(url: &str) -> String {
    let base = url
        .split_once("/abs/")
        .map_or_else(|| url.rsplit('/').next().unwrap_or(url), |(_, rest)| rest);
    if let Some(idx) = base.rfind('v') {
        let suffix = &base[idx + 1..];
        if !suffix.is_empty() && suffix.chars().all(|c| c.is_ascii_digit()) {
            return base[..idx].to_string();
        }
    }
    base.to_string()
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
