// src/fetch/html.rs

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static ROW: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("selector should parse"));
static CELL: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("selector should parse"));

/// Pulls data rows out of the first `<table>` carrying a given class.
#[derive(Debug, Clone)]
pub struct TableExtractor {
    class: String,
    table: Selector,
}

impl TableExtractor {
    pub fn new(class: &str) -> Result<Self> {
        let css = format!(r#"table[class~="{}"]"#, class);
        let table = Selector::parse(&css)
            .map_err(|e| anyhow!("invalid table class {:?}: {:?}", class, e))?;
        Ok(Self {
            class: class.to_string(),
            table,
        })
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    /// `None` when the page has no such table. Otherwise one entry per `<tr>`
    /// after the header row, holding the trimmed text of its `<td>` cells.
    pub fn extract(&self, html: &str) -> Option<Vec<Vec<String>>> {
        let doc = Html::parse_document(html);
        let table = doc.select(&self.table).next()?;
        Some(table.select(&ROW).skip(1).map(row_cells).collect())
    }
}

fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    row.select(&CELL)
        .map(|cell| cell.text().collect::<String>().trim().to_string())
        .collect()
}
