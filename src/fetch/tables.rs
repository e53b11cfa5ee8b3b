// src/fetch/tables.rs

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use crate::error::{CorrectionError, Result};
use crate::table::labels::{canonical_month, fold};
use crate::table::{RawGrid, REQUIRED_COLUMNS};

static TABLE_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("table").expect("table selector should parse"));
static ROW_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("row selector should parse"));
static ID_SEL: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[id]").expect("id selector should parse"));

/// How the rate table is laid out on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Pick by where the month names are: across the header, or down the
    /// first column.
    #[default]
    Auto,
    /// One row per year, one column per month.
    YearRows,
    /// One row per month, one column per year.
    MonthRows,
}

/// Which `<table>` on the page holds the rates and how to read it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSelection {
    /// `id` attribute of the table, or of an element wrapping it.
    pub id: Option<String>,
    /// Zero-based position among all tables on the page.
    pub index: Option<usize>,
    /// Fallback: first table whose header rows or first column contain
    /// every keyword (case and accent insensitive).
    pub keywords: Vec<String>,
    /// Rows to skip before the header row.
    pub header_row: usize,
    pub layout: Layout,
}

impl Default for TableSelection {
    fn default() -> Self {
        Self {
            id: None,
            index: None,
            keywords: vec!["ano".into(), "jan".into(), "dez".into()],
            header_row: 0,
            layout: Layout::Auto,
        }
    }
}

/// One line of `inspect_tables` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub index: usize,
    pub id: Option<String>,
    pub rows: usize,
    pub header: Vec<String>,
}

/// The closest `<table>` enclosing `el`.
fn owning_table<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    el.ancestors()
        .filter_map(ElementRef::wrap)
        .find(|e| e.value().name() == "table")
}

/// Whitespace-collapsed text of `cell`, without the text of any table
/// nested inside it.
fn cell_text(cell: ElementRef<'_>) -> String {
    let owner = owning_table(cell).map(|t| t.id());
    cell.descendants()
        .filter(|n| {
            n.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "table")
                .map(|t| t.id())
                == owner
        })
        .filter_map(|n| n.value().as_text())
        .flat_map(|t| t.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Every non-empty row of `table`, as cell text. Rows and cells of tables
/// nested inside it are left out.
fn table_rows(table: ElementRef<'_>) -> Vec<Vec<String>> {
    table
        .select(&ROW_SEL)
        .filter(|tr| owning_table(*tr).map(|t| t.id()) == Some(table.id()))
        .map(|tr| {
            tr.children()
                .filter_map(ElementRef::wrap)
                .filter(|c| matches!(c.value().name(), "th" | "td"))
                .map(cell_text)
                .collect::<Vec<_>>()
        })
        .filter(|cells| !cells.is_empty())
        .collect()
}

/// Keywords are looked up in the header rows and down the first column,
/// so a table with months as rows matches the same keywords as one with
/// months as columns.
fn header_matches(rows: &[Vec<String>], header_row: usize, keywords: &[String]) -> bool {
    let header = rows.iter().take(header_row + 1).flatten();
    let first_column = rows.iter().skip(header_row + 1).filter_map(|r| r.first());
    let text = header
        .chain(first_column)
        .map(|c| fold(c))
        .collect::<Vec<_>>()
        .join(" ");
    keywords.iter().all(|k| text.contains(&fold(k)))
}

fn month_hits<'a>(cells: impl Iterator<Item = &'a String>) -> usize {
    cells.filter(|c| canonical_month(c).is_some()).count()
}

/// Month names down the first column mean months are rows.
fn detect_layout(headers: &[String], data: &[Vec<String>]) -> Layout {
    let across = month_hits(headers.iter().skip(1));
    let down = month_hits(data.iter().filter_map(|r| r.first()));
    let layout = if down > across {
        Layout::MonthRows
    } else {
        Layout::YearRows
    };
    debug!(across, down, ?layout, "detected table layout");
    layout
}

fn find_by_id<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    let el = doc.select(&ID_SEL).find(|e| e.value().id() == Some(id))?;
    if el.value().name() == "table" {
        Some(el)
    } else {
        el.select(&TABLE_SEL).next()
    }
}

fn pick_table<'a>(doc: &'a Html, sel: &TableSelection) -> Result<ElementRef<'a>> {
    if let Some(id) = sel.id.as_deref() {
        match find_by_id(doc, id) {
            Some(t) => {
                debug!(id, "table selected by id");
                return Ok(t);
            }
            None => warn!(id, "no table with this id; trying other strategies"),
        }
    }

    let tables: Vec<ElementRef<'a>> = doc.select(&TABLE_SEL).collect();
    trace!(count = tables.len(), "tables on page");

    if let Some(index) = sel.index {
        match tables.get(index) {
            Some(t) => {
                debug!(index, "table selected by position");
                return Ok(*t);
            }
            None => warn!(
                index,
                count = tables.len(),
                "table index out of range; trying keywords"
            ),
        }
    }

    if !sel.keywords.is_empty() {
        for (i, t) in tables.iter().enumerate() {
            if header_matches(&table_rows(*t), sel.header_row, &sel.keywords) {
                debug!(index = i, keywords = ?sel.keywords, "table selected by header keywords");
                return Ok(*t);
            }
        }
    }

    Err(CorrectionError::TableNotFound(format!(
        "none of {} table(s) matched id={:?} index={:?} keywords={:?}",
        tables.len(),
        sel.id,
        sel.index,
        sel.keywords
    )))
}

/// Locate the rate table in `html` and return it as a year-per-row grid.
#[instrument(level = "debug", skip(html, selection), fields(html_len = html.len()))]
pub fn extract_table(html: &str, selection: &TableSelection) -> Result<RawGrid> {
    let doc = Html::parse_document(html);
    let table = pick_table(&doc, selection)?;

    let mut rows = table_rows(table);
    if rows.len() <= selection.header_row {
        return Err(CorrectionError::Structural(format!(
            "table has {} row(s); header expected at row {}",
            rows.len(),
            selection.header_row
        )));
    }
    let data = rows.split_off(selection.header_row + 1);
    let headers = rows.pop().unwrap_or_default();

    let layout = match selection.layout {
        Layout::Auto => detect_layout(&headers, &data),
        fixed => fixed,
    };
    let grid = match layout {
        Layout::Auto | Layout::YearRows => RawGrid::new(headers, data),
        Layout::MonthRows => RawGrid::new(headers, data).transpose(),
    };
    grid.ensure_columns(REQUIRED_COLUMNS)?;

    debug!(
        cols = grid.column_count(),
        rows = grid.rows.len(),
        "extracted rate grid"
    );
    Ok(grid)
}

/// Summarise every table on the page.
pub fn list_tables(html: &str) -> Vec<TableSummary> {
    let doc = Html::parse_document(html);
    doc.select(&TABLE_SEL)
        .enumerate()
        .map(|(index, t)| {
            let rows = table_rows(t);
            TableSummary {
                index,
                id: t.value().id().map(str::to_string),
                rows: rows.len(),
                header: rows.into_iter().next().unwrap_or_default(),
            }
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const MONTHS: &str = "<th>Jan</th><th>Fev</th><th>Mar</th><th>Abr</th><th>Mai</th><th>Jun</th>\
        <th>Jul</th><th>Ago</th><th>Set</th><th>Out</th><th>Nov</th><th>Dez</th>";

    pub(crate) fn page() -> String {
        format!(
            r#"<html><body>
            <table id="menu"><tr><td>Início</td><td>Serviços</td></tr></table>
            <div id="selic">
              <table>
                <thead><tr><th>Ano</th>{MONTHS}</tr></thead>
                <tbody>
                  <tr><td>2023</td><td>1,12</td><td>0,92</td><td>1,17</td><td>0,92</td><td>1,12</td><td>1,07</td>
                      <td>1,07</td><td>1,14</td><td>0,97</td><td>1,00</td><td>0,92</td><td>0,89</td></tr>
                  <tr><td> 2024 </td><td>0,97</td><td>0,80</td><td>0,83</td><td>0,89</td><td>0,83</td><td>0,79</td>
                      <td>0,91</td><td>0,87</td><td>0,84</td><td>0,93</td><td>0,79</td><td>0,93</td></tr>
                </tbody>
              </table>
            </div>
            <table><tr><td>rodapé</td></tr></table>
            </body></html>"#
        )
    }

    #[test]
    fn test_select_by_wrapper_id() {
        let sel = TableSelection {
            id: Some("selic".into()),
            keywords: vec![],
            ..Default::default()
        };
        let grid = extract_table(&page(), &sel).unwrap();
        assert_eq!(grid.headers.len(), 13);
        assert_eq!(grid.headers[0], "Ano");
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[1][0], "2024");
        assert_eq!(grid.rows[1][12], "0,93");
    }

    #[test]
    fn test_select_by_index() {
        let sel = TableSelection {
            index: Some(1),
            keywords: vec![],
            ..Default::default()
        };
        let grid = extract_table(&page(), &sel).unwrap();
        assert_eq!(grid.rows[0][1], "1,12");
    }

    #[test]
    fn test_keyword_fallback_when_id_missing() {
        let sel = TableSelection {
            id: Some("gone".into()),
            index: Some(9),
            ..Default::default()
        };
        let grid = extract_table(&page(), &sel).unwrap();
        assert_eq!(grid.rows.len(), 2);
    }

    #[test]
    fn test_no_match_is_table_not_found() {
        let sel = TableSelection {
            keywords: vec!["acumulado".into()],
            ..Default::default()
        };
        let err = extract_table(&page(), &sel).unwrap_err();
        assert!(matches!(err, CorrectionError::TableNotFound(_)));
    }

    #[test]
    fn test_narrow_table_is_structural() {
        let sel = TableSelection {
            id: Some("menu".into()),
            keywords: vec![],
            ..Default::default()
        };
        let err = extract_table(&page(), &sel).unwrap_err();
        assert!(matches!(err, CorrectionError::Structural(_)));
    }

    #[test]
    fn test_header_offset_and_month_rows() {
        let html = r#"<table>
            <tr><td colspan="3">Taxa de juros SELIC</td></tr>
            <tr><th>Mês/Ano</th><th>2023</th><th>2024</th></tr>
            <tr><td>Janeiro</td><td>1,12</td><td>0,97</td></tr>
            <tr><td>Fevereiro</td><td>0,92</td><td>0,80</td></tr>
            <tr><td>Março</td><td>1,17</td><td>0,83</td></tr>
            <tr><td>Abril</td><td>0,92</td><td>0,89</td></tr>
            <tr><td>Maio</td><td>1,12</td><td>0,83</td></tr>
            <tr><td>Junho</td><td>1,07</td><td>0,79</td></tr>
            <tr><td>Julho</td><td>1,07</td><td>0,91</td></tr>
            <tr><td>Agosto</td><td>1,14</td><td>0,87</td></tr>
            <tr><td>Setembro</td><td>0,97</td><td>0,84</td></tr>
            <tr><td>Outubro</td><td>1,00</td><td>0,93</td></tr>
            <tr><td>Novembro</td><td>0,92</td><td>0,79</td></tr>
            <tr><td>Dezembro</td><td>0,89</td><td>0,93</td></tr>
        </table>"#;
        let sel = TableSelection {
            keywords: vec!["mes/ano".into()],
            header_row: 1,
            layout: Layout::MonthRows,
            ..Default::default()
        };
        let grid = extract_table(html, &sel).unwrap();
        assert_eq!(grid.headers[1], "Janeiro");
        assert_eq!(grid.rows[0][0], "2023");
        assert_eq!(grid.rows[1][3], "0,83");
    }

    #[test]
    fn test_default_selection_reads_month_rows() {
        let html = r#"<html><body><table>
            <tr><th>Mês/Ano</th><th>2023</th><th>2024</th></tr>
            <tr><td>Janeiro</td><td>1,12</td><td>0,97</td></tr>
            <tr><td>Fevereiro</td><td>0,92</td><td>0,80</td></tr>
            <tr><td>Março</td><td>1,17</td><td>0,83</td></tr>
            <tr><td>Abril</td><td>0,92</td><td>0,89</td></tr>
            <tr><td>Maio</td><td>1,12</td><td>0,83</td></tr>
            <tr><td>Junho</td><td>1,07</td><td>0,79</td></tr>
            <tr><td>Julho</td><td>1,07</td><td>0,91</td></tr>
            <tr><td>Agosto</td><td>1,14</td><td>0,87</td></tr>
            <tr><td>Setembro</td><td>0,97</td><td>0,84</td></tr>
            <tr><td>Outubro</td><td>1,00</td><td>0,93</td></tr>
            <tr><td>Novembro</td><td>0,92</td><td>0,79</td></tr>
            <tr><td>Dezembro</td><td>0,89</td><td>0,93</td></tr>
        </table></body></html>"#;
        let grid = extract_table(html, &TableSelection::default()).unwrap();
        assert_eq!(grid.headers.len(), 13);
        assert_eq!(grid.headers[1], "Janeiro");
        assert_eq!(grid.rows.len(), 2);
        assert_eq!(grid.rows[0][0], "2023");
        assert_eq!(grid.rows[1][12], "0,93");
    }

    #[test]
    fn test_auto_layout_keeps_year_rows() {
        let grid = extract_table(&page(), &TableSelection::default()).unwrap();
        assert_eq!(grid.headers[1], "Jan");
        assert_eq!(grid.rows[0][0], "2023");
    }

    #[test]
    fn test_nested_table_rows_are_ignored() {
        let html = format!(
            r#"<table id="selic">
                <tr><th>Ano</th>{MONTHS}</tr>
                <tr><td>2023</td><td>1,12</td><td>0,92</td><td>1,17</td><td>0,92</td><td>1,12</td><td>1,07</td>
                    <td>1,07</td><td>1,14</td><td>0,97</td><td>1,00</td><td>0,92</td>
                    <td>0,89<table><tr><td>nota</td><td>1</td></tr></table></td></tr>
            </table>"#
        );
        let sel = TableSelection {
            id: Some("selic".into()),
            ..Default::default()
        };
        let grid = extract_table(&html, &sel).unwrap();
        assert_eq!(grid.rows.len(), 1);
        assert_eq!(grid.rows[0].len(), 13);
        assert_eq!(grid.rows[0][12], "0,89");

        let summaries = list_tables(&html);
        assert_eq!(summaries[0].rows, 2);
        assert_eq!(summaries[1].rows, 1);
    }

    #[test]
    fn test_list_tables() {
        let summaries = list_tables(&page());
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].id.as_deref(), Some("menu"));
        assert_eq!(summaries[1].rows, 3);
        assert_eq!(summaries[1].header[0], "Ano");
    }
}
