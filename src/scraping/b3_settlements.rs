// Parser for the BM&F "Ajustes do Pregão" (trading session settlements) page.
//
// All knowledge of the page markup lives here. The page lists one table row
// per contract with six cells: commodity, contract month, previous settlement,
// current settlement, variation and settlement value per contract. Only the
// first row of each commodity group carries the commodity name.

use anyhow::Result;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use crate::db::ContractRow;
use crate::error::FuturesError;

/// Number of cells in a contract row
pub const CONTRACT_CELLS: usize = 6;

/// Extract every contract row from the settlement page.
///
/// Fails with a parse error when the page holds no table or no contract rows,
/// which is how markup drift on the source side shows up.
pub fn parse_settlement_page(html: &str) -> Result<Vec<ContractRow>> {
    let document = Html::parse_document(html);
    let table_sel = selector("table")?;
    let row_sel = selector("tr")?;

    let mut rows = Vec::new();
    let mut tables_seen = 0;

    for table in document.select(&table_sel) {
        tables_seen += 1;
        if !has_settlement_header(&table, &row_sel) {
            debug!("Skipping table #{}: header is not a settlement header", tables_seen);
            continue;
        }

        let mut current_commodity: Option<String> = None;
        for row in own_rows(&table, &row_sel) {
            let cells: Vec<String> = child_cells(&row, "td").map(cell_text).collect();
            if cells.len() != CONTRACT_CELLS {
                continue;
            }

            // Group captions and totals have no contract month
            if cells[1].is_empty() {
                debug!("Skipping six-cell row without contract month: {:?}", cells);
                continue;
            }

            if !cells[0].is_empty() {
                current_commodity = Some(cells[0].clone());
            }

            let commodity = match &current_commodity {
                Some(name) => name.clone(),
                None => {
                    warn!("Contract {} listed before any commodity name", cells[1]);
                    String::new()
                }
            };

            let mut cells = cells.into_iter().skip(1);
            let mut next = || cells.next().unwrap_or_default();
            rows.push(ContractRow {
                commodity,
                contract_month: next(),
                previous_price: next(),
                current_price: next(),
                variation: next(),
                settlement_value: next(),
            });
        }
    }

    if tables_seen == 0 {
        return Err(FuturesError::Parse("no table found in settlement page".into()).into());
    }
    if rows.is_empty() {
        return Err(FuturesError::Parse(format!(
            "no contract rows found in {} table(s); page markup may have changed",
            tables_seen
        ))
        .into());
    }

    debug!("Parsed {} contract rows from {} table(s)", rows.len(), tables_seen);
    Ok(rows)
}

/// A table qualifies when it has no `th` header at all, or when one of its
/// header rows has exactly six header cells.
fn has_settlement_header(table: &ElementRef, row_sel: &Selector) -> bool {
    let header_counts: Vec<usize> = own_rows(table, row_sel)
        .map(|row| child_cells(&row, "th").count())
        .filter(|count| *count > 0)
        .collect();

    header_counts.is_empty() || header_counts.contains(&CONTRACT_CELLS)
}

/// Direct `td`/`th` children of a row
fn child_cells<'a>(row: &ElementRef<'a>, name: &'static str) -> impl Iterator<Item = ElementRef<'a>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(move |cell| cell.value().name() == name)
}

/// Rows whose nearest enclosing table is `table`, skipping nested tables
fn own_rows<'a>(
    table: &ElementRef<'a>,
    row_sel: &'a Selector,
) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let table_id = table.id();
    table.select(row_sel).filter(move |row| {
        row.ancestors()
            .find(|node| node.value().as_element().is_some_and(|e| e.name() == "table"))
            .map(|node| node.id())
            == Some(table_id)
    })
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css)
        .map_err(|e| FuturesError::Parse(format!("invalid selector '{}': {:?}", css, e)).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body>
        <table id="tblDadosAjustes">
          <thead>
            <tr>
              <th>Commodity</th><th>Contract Month</th><th>Previous Settlement Price</th>
              <th>Current Settlement Price</th><th>Variation</th><th>Settlement Value per Contract (R$)</th>
            </tr>
          </thead>
          <tbody>
            <tr><td>DI1   - 1-day Interbank Deposits</td><td>F26</td><td>99,250.12</td><td>99,262.54</td><td>12.42</td><td>12.42</td></tr>
            <tr><td></td><td>J27</td><td>100.0</td><td>101.0</td><td>1.0</td><td>1,000,000</td></tr>
            <tr><td>DOL - US Dollar</td><td>X25</td><td>5,430.10</td><td>5,401.90</td><td>-28.20</td><td>-1,410.00</td></tr>
            <tr><td>&nbsp;</td><td> Z25 </td><td></td><td>5,420.00</td><td></td><td></td></tr>
          </tbody>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parses_rows_and_carries_commodity_forward() {
        let rows = parse_settlement_page(PAGE).unwrap();
        assert_eq!(rows.len(), 4);

        assert_eq!(rows[0].commodity, "DI1 - 1-day Interbank Deposits");
        assert_eq!(rows[0].contract_month, "F26");
        assert_eq!(rows[0].previous_price, "99,250.12");

        assert_eq!(rows[1].commodity, "DI1 - 1-day Interbank Deposits");
        assert_eq!(rows[1].contract_month, "J27");
        assert_eq!(rows[1].settlement_value, "1,000,000");

        assert_eq!(rows[2].commodity, "DOL - US Dollar");
        assert_eq!(rows[3].commodity, "DOL - US Dollar");
        assert_eq!(rows[3].contract_month, "Z25");
    }

    #[test]
    fn test_blank_cells_become_empty_marker() {
        let rows = parse_settlement_page(PAGE).unwrap();
        let z25 = &rows[3];
        assert_eq!(z25.previous_price, "");
        assert_eq!(z25.current_price, "5,420.00");
        assert_eq!(z25.variation, "");
        assert_eq!(z25.settlement_value, "");
    }

    #[test]
    fn test_skips_tables_with_other_headers() {
        let html = r#"
            <table><tr><th>Date</th><th>Session</th></tr>
                   <tr><td>a</td><td>b</td><td>c</td><td>d</td><td>e</td><td>f</td></tr></table>
            <table><tr><td>WIN - Mini Ibovespa</td><td>Z25</td><td>1</td><td>2</td><td>1</td><td>0.2</td></tr></table>
        "#;
        let rows = parse_settlement_page(html).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].commodity, "WIN - Mini Ibovespa");
    }

    #[test]
    fn test_commodity_does_not_leak_between_tables() {
        let html = r#"
            <table><tr><td>CCM - Corn</td><td>F26</td><td>1</td><td>2</td><td>1</td><td>450</td></tr></table>
            <table><tr><td></td><td>H26</td><td>1</td><td>2</td><td>1</td><td>450</td></tr></table>
        "#;
        let rows = parse_settlement_page(html).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].commodity, "CCM - Corn");
        assert_eq!(rows[1].commodity, "");
    }

    #[test]
    fn test_header_footer_and_short_rows_are_ignored() {
        let html = r#"
            <table>
              <tr><th>C</th><th>M</th><th>P</th><th>C</th><th>V</th><th>S</th></tr>
              <tr><td colspan="6">Interest rates</td></tr>
              <tr><td>DAP - DI x IPCA</td><td>K27</td><td>1</td><td>2</td><td>1</td><td>3</td></tr>
              <tr><td>Total</td><td></td><td></td><td></td><td></td><td></td></tr>
            </table>
        "#;
        let rows = parse_settlement_page(html).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].contract_month, "K27");
    }

    #[test]
    fn test_missing_table_is_parse_error() {
        let err = parse_settlement_page("<html><body><p>Maintenance</p></body></html>").unwrap_err();
        assert!(matches!(
            crate::error::classify(&err),
            Some(FuturesError::Parse(_))
        ));
    }

    #[test]
    fn test_table_without_contract_rows_is_parse_error() {
        let html = "<table><tr><td>only</td><td>two</td></tr></table>";
        let err = parse_settlement_page(html).unwrap_err();
        assert!(err.to_string().contains("no contract rows"));
    }

    #[test]
    fn test_layout_table_does_not_duplicate_rows() {
        let html = r#"
            <table class="layout"><tr><td>
              <table id="tblDadosAjustes">
                <tr>
                  <th>Commodity</th><th>Contract Month</th><th>Previous</th>
                  <th>Current</th><th>Variation</th><th>Value</th>
                </tr>
                <tr><td>DI1 - 1-day Interbank Deposits</td><td>F26</td><td>1</td><td>2</td><td>1</td><td>10</td></tr>
                <tr><td></td><td>J27</td><td>1</td><td>2</td><td>1</td><td>10</td></tr>
              </table>
            </td></tr></table>
        "#;
        let rows = parse_settlement_page(html).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].commodity, "DI1 - 1-day Interbank Deposits");
        assert_eq!(rows[1].contract_month, "J27");
    }
}
