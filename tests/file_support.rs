//! Supported document formats on disk: markdown, plain text and PDF.
//!
//! PDFs are generated in-test as a minimal single-page document so no binary
//! fixtures are needed.

use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use ragdesk::config::LoaderConfig;
use ragdesk::connector_fs::{DocumentLoader, FsLoader};
use ragdesk::embedding::{EmbedRequest, Embedder};
use ragdesk::extract::extract_text;
use ragdesk::ingest::index_sources;
use ragdesk::models::{DocKind, SourceKind, Store};
use ragdesk::search::query;
use ragdesk::store::{self, CorpusInput, NewSource};

const PHRASE: &str = "quarterly budget review";

/// Single-page PDF showing [`PHRASE`] in Helvetica.
fn pdf_with_phrase() -> Vec<u8> {
    pdf_with_content(&format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", PHRASE))
}

/// Single-page PDF whose resources define only font `/F1`.
fn pdf_with_content(content: &str) -> Vec<u8> {
    let mut out = Vec::new();
    let mut offsets = Vec::new();

    out.extend_from_slice(b"%PDF-1.4\n");
    offsets.push(out.len());
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    offsets.push(out.len());
    out.extend_from_slice(
        b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
          /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n",
    );
    offsets.push(out.len());
    out.extend_from_slice(
        format!(
            "4 0 obj << /Length {} >> stream\n{}\nendstream endobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );
    offsets.push(out.len());
    out.extend_from_slice(b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n");

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in &offsets {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer << /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            offsets.len() + 1,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// Puts every text on the same axis so every chunk matches every query.
struct FlatEmbedder;

#[async_trait]
impl Embedder for FlatEmbedder {
    async fn embed_texts(&self, req: &EmbedRequest<'_>) -> Result<Vec<Vec<f32>>> {
        Ok(req.texts.iter().map(|_| vec![1.0, 0.0]).collect())
    }
}

fn folder_source(store: &mut Store, dir: &Path) -> String {
    store::add_source(
        store,
        NewSource {
            kind: SourceKind::Folder,
            label: "Finance".into(),
            path: dir.display().to_string(),
            note: None,
            enabled: true,
        },
    )
    .unwrap()
    .id
}

#[test]
fn pdf_text_is_extracted() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("report.pdf");
    fs::write(&path, pdf_with_phrase()).unwrap();

    let text = extract_text(&path).unwrap();
    assert!(text.contains(PHRASE), "extracted: {:?}", text);
}

#[test]
fn uppercase_pdf_extension_is_listed() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("SCAN.PDF"), pdf_with_phrase()).unwrap();
    fs::write(tmp.path().join("photo.jpg"), b"\xff\xd8\xff").unwrap();

    let loader = FsLoader::new(&LoaderConfig::default()).unwrap();
    let files = loader.list_files(tmp.path(), 10);
    assert_eq!(files, vec![tmp.path().join("SCAN.PDF")]);
}

#[tokio::test]
async fn mixed_folder_indexes_every_format() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("notes.md"), "# Budget\n\nNumbers are due Monday.").unwrap();
    fs::write(dir.join("todo.txt"), "Call the accountant.").unwrap();
    fs::write(dir.join("report.pdf"), pdf_with_phrase()).unwrap();

    let mut store = Store::default();
    let src = folder_source(&mut store, dir);
    let c = store::upsert_corpus(
        &mut store,
        CorpusInput {
            id: None,
            name: "Finance".into(),
            source_ids: vec![src.clone()],
        },
    )
    .unwrap()
    .id;

    let loader = FsLoader::new(&LoaderConfig::default()).unwrap();
    let report = index_sources(&mut store, &[src.clone()], &FlatEmbedder, &loader).await;
    assert_eq!(report.indexed, 3);
    assert!(report.errors.is_empty(), "errors: {:?}", report.errors);

    let result = query(&store, &[c], "budget", &FlatEmbedder).await.unwrap();
    let pdf = result
        .sources
        .iter()
        .find(|s| s.title == "Finance — report.pdf")
        .expect("pdf citation");
    assert_eq!(pdf.kind, DocKind::File);
    assert!(pdf.snippet.contains(PHRASE));
}

#[tokio::test]
async fn corrupt_pdf_is_reported_and_siblings_still_index() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("good.md"), "Budget numbers are due Monday.").unwrap();
    fs::write(dir.join("broken.pdf"), b"%PDF-1.4\nthis is not a real pdf").unwrap();

    let mut store = Store::default();
    let src = folder_source(&mut store, dir);

    let loader = FsLoader::new(&LoaderConfig::default()).unwrap();
    let report = index_sources(&mut store, &[src.clone()], &FlatEmbedder, &loader).await;

    assert_eq!(report.indexed, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(
        report.errors[0].file_path.as_deref(),
        Some(dir.join("broken.pdf").display().to_string().as_str())
    );
    assert_eq!(store.index[&src].chunks.len(), 1);
}

#[tokio::test]
async fn pdf_with_undefined_font_is_reported_and_siblings_still_index() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path();
    fs::write(dir.join("a.md"), "Budget numbers are due Monday.").unwrap();
    fs::write(
        dir.join("b.pdf"),
        pdf_with_content("BT /F9 12 Tf 100 700 Td (missing font) Tj ET"),
    )
    .unwrap();
    fs::write(dir.join("c.md"), "Call the accountant on Tuesday.").unwrap();

    let err = extract_text(&dir.join("b.pdf")).unwrap_err();
    assert!(err.to_string().contains("PDF extraction failed"), "{}", err);

    let mut store = Store::default();
    let src = folder_source(&mut store, dir);
    let loader = FsLoader::new(&LoaderConfig::default()).unwrap();
    let report = index_sources(&mut store, &[src.clone()], &FlatEmbedder, &loader).await;

    assert_eq!(report.indexed, 2);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(
        report.errors[0].file_path.as_deref(),
        Some(dir.join("b.pdf").display().to_string().as_str())
    );
    assert_eq!(store.index[&src].chunks.len(), 2);
}
