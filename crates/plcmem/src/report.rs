//! Human-readable and JSON layout reports.

use std::fmt;

use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use plcmem_layout::{resolve, LayoutTable, Shape, SlotKind};
use serde::Serialize;

use crate::error::Result;

/// One row of a layout report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldReport {
    /// Dotted path from the root record, e.g. `status.code`.
    pub path: String,
    pub order: u32,
    #[serde(rename = "type")]
    pub kind: String,
    /// Absolute offset from the start of the root record.
    pub offset: usize,
    pub size: usize,
    /// First and last chunk index the field touches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<(usize, usize)>,
}

/// Resolved layout of a shape, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayoutReport {
    pub shape: String,
    pub total_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_count: Option<usize>,
    pub fields: Vec<FieldReport>,
}

impl LayoutReport {
    /// Build a report from a resolved layout.
    ///
    /// A chunk size of zero is treated as absent.
    pub fn from_layout(layout: &LayoutTable, chunk_size: Option<usize>) -> Self {
        let chunk_size = chunk_size.filter(|&size| size > 0);
        let mut fields = Vec::new();
        flatten(layout, "", 0, chunk_size, &mut fields);

        Self {
            shape: layout.name.clone(),
            total_size: layout.total_size,
            chunk_size,
            chunk_count: chunk_size.map(|size| layout.total_size.div_ceil(size)),
            fields,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn table(&self) -> Table {
        let mut header = vec!["ORDER", "FIELD", "TYPE", "OFFSET", "SIZE"];
        if self.chunk_size.is_some() {
            header.push("CHUNK");
        }

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header);

        for field in &self.fields {
            let mut row = vec![
                field.order.to_string(),
                field.path.clone(),
                field.kind.clone(),
                field.offset.to_string(),
                field.size.to_string(),
            ];
            if self.chunk_size.is_some() {
                row.push(chunk_label(field.chunks));
            }
            table.add_row(row);
        }
        table
    }
}

impl fmt::Display for LayoutReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.shape, self.total_size)?;
        if let (Some(size), Some(count)) = (self.chunk_size, self.chunk_count) {
            write!(f, ", chunk size {size}, {count} chunk(s)")?;
        }
        if self.fields.is_empty() {
            return Ok(());
        }
        write!(f, "\n{}", self.table())
    }
}

/// Resolve `shape` and build its layout report.
pub fn describe_report(shape: &Shape, chunk_size: Option<usize>) -> Result<LayoutReport> {
    let layout = resolve(shape)?;
    Ok(LayoutReport::from_layout(&layout, chunk_size))
}

/// Render the layout of `shape` as a table.
///
/// With a chunk size the header includes the chunk count and each row the
/// chunk indices its bytes fall into.
pub fn describe(shape: &Shape, chunk_size: Option<usize>) -> Result<String> {
    Ok(describe_report(shape, chunk_size)?.to_string())
}

fn flatten(
    layout: &LayoutTable,
    prefix: &str,
    base: usize,
    chunk_size: Option<usize>,
    out: &mut Vec<FieldReport>,
) {
    for field in &layout.fields {
        let path = if prefix.is_empty() {
            field.name.clone()
        } else {
            format!("{prefix}.{}", field.name)
        };
        let offset = base + field.offset;

        out.push(FieldReport {
            path: path.clone(),
            order: field.order,
            kind: field.kind.describe(),
            offset,
            size: field.size,
            chunks: chunk_size.and_then(|size| chunk_span(offset, field.size, size)),
        });

        if let SlotKind::Nested(nested) = &field.kind {
            flatten(nested, &path, offset, chunk_size, out);
        }
    }
}

fn chunk_span(offset: usize, size: usize, chunk_size: usize) -> Option<(usize, usize)> {
    if size == 0 {
        return None;
    }
    Some((offset / chunk_size, (offset + size - 1) / chunk_size))
}

fn chunk_label(chunks: Option<(usize, usize)>) -> String {
    match chunks {
        Some((first, last)) if first == last => first.to_string(),
        Some((first, last)) => format!("{first}-{last}"),
        None => "-".to_string(),
    }
}
