//! Request building: maps an operation descriptor to a concrete request
//!
//! Each [`Operation`] declares the parameters it requires, the response
//! [`Shape`] it produces and the column schema of its tabular rows. Building
//! is pure: no I/O, no shared state. A descriptor is an immutable value; the
//! orchestrator derives a fresh one per batch with
//! [`RequestDescriptor::with_entries`].

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};
use crate::types::{EntryId, Shape};

/// Separator between entries in a request path
pub const ENTRY_SEPARATOR: &str = "+";

/// KEGG REST operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Database statistics
    Info,
    /// Entry listing
    List,
    /// Keyword/formula search
    Find,
    /// Entry retrieval
    Get,
    /// Identifier conversion
    Conv,
    /// Cross-references
    Link,
    /// Drug-drug interactions
    Ddi,
}

impl Operation {
    /// Path segment of the operation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Info => "info",
            Operation::List => "list",
            Operation::Find => "find",
            Operation::Get => "get",
            Operation::Conv => "conv",
            Operation::Link => "link",
            Operation::Ddi => "ddi",
        }
    }

    /// Column names of the operation's tab-separated rows
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Operation::List | Operation::Find => &["entry_id", "description"],
            Operation::Conv | Operation::Link => &["source_id", "target_id"],
            Operation::Ddi => &["drug1", "drug2", "interaction_type"],
            Operation::Info | Operation::Get => &[],
        }
    }

    /// Whether the operation takes an entry list that can be split into batches
    pub fn is_batchable(&self) -> bool {
        matches!(
            self,
            Operation::Get | Operation::Conv | Operation::Link | Operation::Ddi
        )
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format option of the `get` operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GetOption {
    /// Amino acid sequence (FASTA)
    Aaseq,
    /// Nucleotide sequence (FASTA)
    Ntseq,
    /// MOL file
    Mol,
    /// KCF file
    Kcf,
    /// Image (PNG/GIF)
    Image,
    /// Image configuration
    Conf,
    /// KGML
    Kgml,
    /// JSON
    Json,
}

impl GetOption {
    /// Path segment of the option
    pub fn as_str(&self) -> &'static str {
        match self {
            GetOption::Aaseq => "aaseq",
            GetOption::Ntseq => "ntseq",
            GetOption::Mol => "mol",
            GetOption::Kcf => "kcf",
            GetOption::Image => "image",
            GetOption::Conf => "conf",
            GetOption::Kgml => "kgml",
            GetOption::Json => "json",
        }
    }

    /// Shape of responses produced with this option
    pub fn shape(&self) -> Shape {
        match self {
            GetOption::Aaseq | GetOption::Ntseq => Shape::Sequence,
            GetOption::Mol | GetOption::Kcf | GetOption::Kgml => Shape::Text,
            GetOption::Image => Shape::Binary,
            GetOption::Json => Shape::Json,
            GetOption::Conf => Shape::FlatFile,
        }
    }

    /// Entries the remote service accepts per request with this option
    pub fn max_entries(&self) -> Option<usize> {
        match self {
            GetOption::Image | GetOption::Kgml | GetOption::Json => Some(1),
            _ => None,
        }
    }
}

/// RDF output option of the `link` operation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RdfOption {
    /// Turtle
    #[serde(rename = "turtle")]
    Turtle,
    /// N-Triples
    #[serde(rename = "n-triple")]
    NTriple,
}

impl RdfOption {
    /// Path segment of the option
    pub fn as_str(&self) -> &'static str {
        match self {
            RdfOption::Turtle => "turtle",
            RdfOption::NTriple => "n-triple",
        }
    }
}

/// HTTP method of a request
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
    /// GET
    Get,
}

/// Concrete request: method, target and the shape its response is declared to have
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// HTTP method
    pub method: Method,
    /// Target URL
    pub url: Url,
    /// Declared shape of the response body
    pub shape: Shape,
}

/// Validated operation descriptor
///
/// Built with the constructor of its operation and the `with_*` methods,
/// which consume and return the descriptor so every value is immutable once
/// handed out.
///
/// ```
/// use kegg_dl::request::{GetOption, RequestDescriptor};
///
/// let descriptor = RequestDescriptor::get(["hsa:10458", "hsa:7157"]).with_get_option(GetOption::Aaseq);
/// let request = descriptor.build("https://rest.kegg.jp").unwrap();
/// assert_eq!(request.url.as_str(), "https://rest.kegg.jp/get/hsa:10458+hsa:7157/aaseq");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Operation kind
    pub operation: Operation,
    /// Database name (info, list, find)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Entry identifiers (list, get, conv, link, ddi)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entries: Vec<EntryId>,
    /// Organism code (list pathway)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organism: Option<String>,
    /// BRITE option (list brite)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brite_option: Option<String>,
    /// Search query (find)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Search option (find)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub find_option: Option<String>,
    /// Output format (get)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get_option: Option<GetOption>,
    /// Target database (conv, link)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_db: Option<String>,
    /// Source database (conv, link)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_db: Option<String>,
    /// RDF output (link)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdf_option: Option<RdfOption>,
}

impl RequestDescriptor {
    /// Empty descriptor for an operation
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            database: None,
            entries: Vec::new(),
            organism: None,
            brite_option: None,
            query: None,
            find_option: None,
            get_option: None,
            target_db: None,
            source_db: None,
            rdf_option: None,
        }
    }

    /// `info/{database}`
    pub fn info(database: impl Into<String>) -> Self {
        Self::new(Operation::Info).with_database(database)
    }

    /// `list/{database}`
    pub fn list(database: impl Into<String>) -> Self {
        Self::new(Operation::List).with_database(database)
    }

    /// `find/{database}/{query}`
    pub fn find(database: impl Into<String>, query: impl Into<String>) -> Self {
        let mut descriptor = Self::new(Operation::Find).with_database(database);
        descriptor.query = Some(query.into());
        descriptor
    }

    /// `get/{entries}`
    pub fn get<I, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EntryId>,
    {
        Self::new(Operation::Get).with_entries(entries)
    }

    /// `conv/{target_db}/...`
    pub fn conv(target_db: impl Into<String>) -> Self {
        let mut descriptor = Self::new(Operation::Conv);
        descriptor.target_db = Some(target_db.into());
        descriptor
    }

    /// `link/{target_db}/...`
    pub fn link(target_db: impl Into<String>) -> Self {
        let mut descriptor = Self::new(Operation::Link);
        descriptor.target_db = Some(target_db.into());
        descriptor
    }

    /// `ddi/{entries}`
    pub fn ddi<I, E>(entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EntryId>,
    {
        Self::new(Operation::Ddi).with_entries(entries)
    }

    /// Replace the entry list
    pub fn with_entries<I, E>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<EntryId>,
    {
        self.entries = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Set the database
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the organism code
    pub fn with_organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = Some(organism.into());
        self
    }

    /// Set the BRITE option
    pub fn with_brite_option(mut self, option: impl Into<String>) -> Self {
        self.brite_option = Some(option.into());
        self
    }

    /// Set the search option
    pub fn with_find_option(mut self, option: impl Into<String>) -> Self {
        self.find_option = Some(option.into());
        self
    }

    /// Set the output format of `get`
    pub fn with_get_option(mut self, option: GetOption) -> Self {
        self.get_option = Some(option);
        self
    }

    /// Set the source database of `conv`/`link`
    pub fn with_source_db(mut self, source_db: impl Into<String>) -> Self {
        self.source_db = Some(source_db.into());
        self
    }

    /// Set the RDF output of `link`
    pub fn with_rdf_option(mut self, option: RdfOption) -> Self {
        self.rdf_option = Some(option);
        self
    }

    /// Shape the response to this descriptor is declared to have
    pub fn shape(&self) -> Shape {
        match self.operation {
            Operation::Info => Shape::Text,
            Operation::List | Operation::Find | Operation::Conv | Operation::Ddi => {
                Shape::Tabular
            }
            Operation::Link if self.rdf_option.is_some() => Shape::Text,
            Operation::Link => Shape::Tabular,
            Operation::Get => self
                .get_option
                .map(|option| option.shape())
                .unwrap_or(Shape::FlatFile),
        }
    }

    /// Column schema for tabular responses
    pub fn columns(&self) -> &'static [&'static str] {
        self.operation.columns()
    }

    /// Largest entry count the remote accepts in one request, if restricted
    pub fn max_entries_per_request(&self) -> Option<usize> {
        match self.operation {
            Operation::Get => self.get_option.and_then(|option| option.max_entries()),
            _ => None,
        }
    }

    /// Name under which streamed results of this descriptor are stored
    pub fn storage_key(&self) -> String {
        let mut key = format!("kegg_{}", self.operation);
        if let Some(option) = self.get_option {
            key.push('_');
            key.push_str(option.as_str());
        }
        key
    }

    /// Build the concrete request against `base_url`
    ///
    /// Fails with [`Error::MalformedDescriptor`] when a parameter required by
    /// the operation is absent or empty.
    pub fn build(&self, base_url: &str) -> Result<Request> {
        let path = self.path()?;
        let target = format!("{}/{}", base_url.trim_end_matches('/'), path);
        let url = Url::parse(&target).map_err(|e| self.malformed(format!("invalid URL '{target}': {e}")))?;

        Ok(Request {
            method: Method::Get,
            url,
            shape: self.shape(),
        })
    }

    /// Path below the base URL, from the operation's template
    fn path(&self) -> Result<String> {
        let op = self.operation.as_str();
        let path = match self.operation {
            Operation::Info => format!("{op}/{}", segment(self.require(&self.database, "database")?)),
            Operation::List => {
                if !self.entries.is_empty() {
                    format!("{op}/{}", self.joined_entries()?)
                } else if let (Some(organism), Some("pathway")) =
                    (self.non_empty(&self.organism), self.database.as_deref())
                {
                    format!("{op}/pathway/{}", segment(organism))
                } else if let Some(option) = self.non_empty(&self.brite_option) {
                    format!("{op}/brite/{}", segment(option))
                } else {
                    let database = self.non_empty(&self.database).ok_or_else(|| {
                        self.malformed("one of entries, database or brite_option is required")
                    })?;
                    format!("{op}/{}", segment(database))
                }
            }
            Operation::Find => {
                let database = self.require(&self.database, "database")?;
                let query = self.require(&self.query, "query")?;
                let mut path = format!("{op}/{}/{}", segment(database), urlencoding::encode(query));
                if let Some(option) = self.non_empty(&self.find_option) {
                    path.push('/');
                    path.push_str(&segment(option));
                }
                path
            }
            Operation::Get => {
                let mut path = format!("{op}/{}", self.joined_entries()?);
                if let Some(option) = self.get_option {
                    path.push('/');
                    path.push_str(option.as_str());
                }
                path
            }
            Operation::Conv | Operation::Link => {
                let target = self.require(&self.target_db, "target_db")?;
                let source = if !self.entries.is_empty() {
                    self.joined_entries()?
                } else {
                    let source_db = self
                        .non_empty(&self.source_db)
                        .ok_or_else(|| self.malformed("entries or source_db is required"))?;
                    segment(source_db).into_owned()
                };
                let mut path = format!("{op}/{}/{source}", segment(target));
                if let (Operation::Link, Some(option)) = (self.operation, self.rdf_option) {
                    path.push('/');
                    path.push_str(option.as_str());
                }
                path
            }
            Operation::Ddi => format!("{op}/{}", self.joined_entries()?),
        };
        Ok(path)
    }

    fn joined_entries(&self) -> Result<String> {
        if self.entries.is_empty() {
            return Err(self.malformed("at least one entry is required"));
        }
        if self.entries.iter().any(|e| e.as_str().is_empty()) {
            return Err(self.malformed("entries must not be empty strings"));
        }
        Ok(self
            .entries
            .iter()
            .map(|entry| segment(entry.as_str()))
            .collect::<Vec<_>>()
            .join(ENTRY_SEPARATOR))
    }

    fn non_empty<'a>(&self, value: &'a Option<String>) -> Option<&'a str> {
        value.as_deref().filter(|v| !v.trim().is_empty())
    }

    fn require<'a>(&self, value: &'a Option<String>, name: &str) -> Result<&'a str> {
        self.non_empty(value)
            .ok_or_else(|| self.malformed(format!("{name} is required")))
    }

    fn malformed(&self, message: impl Into<String>) -> Error {
        Error::MalformedDescriptor {
            operation: self.operation.to_string(),
            message: message.into(),
        }
    }
}

/// Percent-encode one path parameter
///
/// Everything outside the unreserved set is escaped except `:`, which is a
/// valid path character and separates organism from gene in KEGG ids. A `+`
/// inside an id is escaped so it cannot read as an entry separator.
fn segment(value: &str) -> Cow<'_, str> {
    let encoded = urlencoding::encode(value);
    if encoded.contains("%3A") {
        Cow::Owned(encoded.replace("%3A", ":"))
    } else {
        encoded
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://rest.kegg.jp";

    fn url(descriptor: &RequestDescriptor) -> String {
        descriptor.build(BASE).unwrap().url.to_string()
    }

    fn assert_malformed(descriptor: RequestDescriptor) {
        match descriptor.build(BASE) {
            Err(Error::MalformedDescriptor { .. }) => {}
            other => panic!("expected MalformedDescriptor, got {other:?}"),
        }
    }

    #[test]
    fn info_and_list_targets() {
        assert_eq!(url(&RequestDescriptor::info("pathway")), "https://rest.kegg.jp/info/pathway");
        assert_eq!(url(&RequestDescriptor::list("module")), "https://rest.kegg.jp/list/module");
        assert_eq!(
            url(&RequestDescriptor::list("pathway").with_organism("hsa")),
            "https://rest.kegg.jp/list/pathway/hsa"
        );
        assert_eq!(
            url(&RequestDescriptor::new(Operation::List).with_brite_option("br")),
            "https://rest.kegg.jp/list/brite/br"
        );
        assert_eq!(
            url(&RequestDescriptor::new(Operation::List).with_entries(["C00001", "C00002"])),
            "https://rest.kegg.jp/list/C00001+C00002"
        );
    }

    #[test]
    fn find_encodes_query_and_appends_option() {
        assert_eq!(
            url(&RequestDescriptor::find("genes", "shiga toxin")),
            "https://rest.kegg.jp/find/genes/shiga%20toxin"
        );
        assert_eq!(
            url(&RequestDescriptor::find("compound", "174.05-174.15").with_find_option("exact_mass")),
            "https://rest.kegg.jp/find/compound/174.05-174.15/exact_mass"
        );
    }

    #[test]
    fn get_joins_entries_and_appends_option() {
        let descriptor = RequestDescriptor::get(["hsa:10458", "ece:Z5100"]);
        assert_eq!(url(&descriptor), "https://rest.kegg.jp/get/hsa:10458+ece:Z5100");
        assert_eq!(
            url(&descriptor.with_get_option(GetOption::Image)),
            "https://rest.kegg.jp/get/hsa:10458+ece:Z5100/image"
        );
    }

    #[test]
    fn conv_and_link_prefer_entries_over_source_db() {
        assert_eq!(
            url(&RequestDescriptor::conv("ncbi-geneid").with_source_db("hsa")),
            "https://rest.kegg.jp/conv/ncbi-geneid/hsa"
        );
        assert_eq!(
            url(&RequestDescriptor::conv("ncbi-geneid")
                .with_source_db("hsa")
                .with_entries(["hsa:10458"])),
            "https://rest.kegg.jp/conv/ncbi-geneid/hsa:10458"
        );
        assert_eq!(
            url(&RequestDescriptor::link("pathway")
                .with_entries(["hsa:10458"])
                .with_rdf_option(RdfOption::NTriple)),
            "https://rest.kegg.jp/link/pathway/hsa:10458/n-triple"
        );
    }

    #[test]
    fn ddi_requires_entries() {
        assert_eq!(
            url(&RequestDescriptor::ddi(["D00564", "D00100"])),
            "https://rest.kegg.jp/ddi/D00564+D00100"
        );
        assert_malformed(RequestDescriptor::new(Operation::Ddi));
    }

    #[test]
    fn reserved_characters_in_ids_are_escaped() {
        let request = RequestDescriptor::get(["hsa:1", "odd#id", "hsa:3"])
            .build(BASE)
            .unwrap();
        assert_eq!(request.url.path(), "/get/hsa:1+odd%23id+hsa:3");
        assert_eq!(request.url.fragment(), None);

        let request = RequestDescriptor::get(["a?b", "c"]).build(BASE).unwrap();
        assert_eq!(request.url.path(), "/get/a%3Fb+c");
        assert_eq!(request.url.query(), None);

        let request = RequestDescriptor::get(["x/y"])
            .with_get_option(GetOption::Aaseq)
            .build(BASE)
            .unwrap();
        assert_eq!(request.url.path(), "/get/x%2Fy/aaseq");

        // A plus inside an id must not read as a second entry
        assert_eq!(
            url(&RequestDescriptor::ddi(["a+b"])),
            "https://rest.kegg.jp/ddi/a%2Bb"
        );
    }

    #[test]
    fn path_parameters_are_escaped() {
        assert_eq!(
            url(&RequestDescriptor::conv("ncbi-geneid").with_source_db("a/b")),
            "https://rest.kegg.jp/conv/ncbi-geneid/a%2Fb"
        );
        assert_eq!(
            url(&RequestDescriptor::info("path#way")),
            "https://rest.kegg.jp/info/path%23way"
        );
        assert_eq!(
            url(&RequestDescriptor::new(Operation::List).with_brite_option("br:br08303")),
            "https://rest.kegg.jp/list/brite/br:br08303"
        );
    }

    #[test]
    fn missing_required_parameters_are_malformed() {
        assert_malformed(RequestDescriptor::new(Operation::Info));
        assert_malformed(RequestDescriptor::new(Operation::List));
        assert_malformed(RequestDescriptor::new(Operation::Find).with_database("genes"));
        assert_malformed(RequestDescriptor::new(Operation::Get));
        assert_malformed(RequestDescriptor::new(Operation::Conv));
        assert_malformed(RequestDescriptor::conv("ncbi-geneid"));
        assert_malformed(RequestDescriptor::get([""]));
        assert_malformed(RequestDescriptor::info("   "));
    }

    #[test]
    fn trailing_slash_in_base_url_is_ignored() {
        let request = RequestDescriptor::info("kegg").build("http://localhost:8080/").unwrap();
        assert_eq!(request.url.as_str(), "http://localhost:8080/info/kegg");
        assert_eq!(request.method, Method::Get);
    }

    #[test]
    fn shape_follows_operation_and_option() {
        assert_eq!(RequestDescriptor::info("kegg").shape(), Shape::Text);
        assert_eq!(RequestDescriptor::list("module").shape(), Shape::Tabular);
        assert_eq!(RequestDescriptor::get(["x"]).shape(), Shape::FlatFile);
        let get = |option| RequestDescriptor::get(["x"]).with_get_option(option).shape();
        assert_eq!(get(GetOption::Aaseq), Shape::Sequence);
        assert_eq!(get(GetOption::Ntseq), Shape::Sequence);
        assert_eq!(get(GetOption::Mol), Shape::Text);
        assert_eq!(get(GetOption::Kgml), Shape::Text);
        assert_eq!(get(GetOption::Json), Shape::Json);
        assert_eq!(get(GetOption::Image), Shape::Binary);
        assert_eq!(RequestDescriptor::link("pathway").shape(), Shape::Tabular);
        assert_eq!(
            RequestDescriptor::link("pathway").with_rdf_option(RdfOption::Turtle).shape(),
            Shape::Text
        );
    }

    #[test]
    fn single_entry_options_restrict_batch_size() {
        let image = RequestDescriptor::get(["map00010"]).with_get_option(GetOption::Image);
        assert_eq!(image.max_entries_per_request(), Some(1));
        assert_eq!(RequestDescriptor::get(["x"]).max_entries_per_request(), None);
        assert_eq!(RequestDescriptor::conv("up").max_entries_per_request(), None);
    }

    #[test]
    fn storage_key_includes_get_option() {
        assert_eq!(RequestDescriptor::get(["x"]).storage_key(), "kegg_get");
        assert_eq!(
            RequestDescriptor::get(["x"]).with_get_option(GetOption::Aaseq).storage_key(),
            "kegg_get_aaseq"
        );
        assert_eq!(RequestDescriptor::conv("up").storage_key(), "kegg_conv");
    }

    #[test]
    fn with_entries_leaves_template_untouched() {
        let template = RequestDescriptor::conv("ncbi-geneid");
        let batch = template.clone().with_entries(["hsa:1"]);
        assert!(template.entries.is_empty());
        assert_eq!(batch.entries, vec![EntryId::from("hsa:1")]);
    }
}
