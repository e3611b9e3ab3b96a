//! HTML output
//!
//! A single self-contained page: inline CSS, inline script, and the report's
//! rows embedded as JSON. Nothing is fetched over the network.
//!
//! The initial table is rendered server-side in the default view order, so the
//! page is readable with scripting disabled. The script re-renders the table
//! from the embedded rows with the semantics of [`crate::view`]: stable sort
//! toggled per column, case-insensitive id search, and tier filters. Tiers are
//! computed here and embedded per row.

use gpumon_shared::utils::time::format_report_time;
use gpumon_shared::utils::{
    format_gib, format_mib, format_mib_f64, format_seconds, format_signed_mib,
};
use gpumon_shared::{SessionReport, UnitRecord};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::view::{Column, Tier, ViewState};

#[derive(Serialize)]
struct ColumnSpec {
    key: &'static str,
    label: &'static str,
    numeric: bool,
}

#[derive(Serialize)]
struct SortSpec {
    key: &'static str,
    dir: &'static str,
}

#[derive(Serialize)]
struct ViewRow<'a> {
    index: usize,
    id: &'a str,
    status: &'static str,
    tier: &'static str,
    monitored: bool,
    incomplete: bool,
    peak_allocated: u64,
    duration_seconds: f64,
    memory_increase: i64,
    peak_reserved: u64,
    initial_allocated: u64,
    display: BTreeMap<&'static str, String>,
}

#[derive(Serialize)]
struct ViewPayload<'a> {
    columns: Vec<ColumnSpec>,
    default_sort: Option<SortSpec>,
    rows: Vec<ViewRow<'a>>,
}

/// Render the interactive HTML report
pub fn render_html(report: &SessionReport) -> Result<String, serde_json::Error> {
    let data = embed_json(&serde_json::to_string(&payload(report))?);

    let mut out = String::with_capacity(16 * 1024 + report.records.len() * 512);
    // Writing to a String cannot fail
    let _ = write_page(&mut out, report, &data);
    Ok(out)
}

/// Text shown in a cell; the same strings are embedded for the script
fn display_value(record: &UnitRecord, column: Column) -> String {
    match column {
        Column::Id => record.id.clone(),
        Column::Status => record.status.to_string(),
        Column::PeakAllocated => format_mib(record.peak_allocated),
        Column::Duration => format_seconds(record.duration_seconds),
        Column::MemoryIncrease => format_signed_mib(record.memory_increase),
        Column::PeakReserved => format_mib(record.peak_reserved),
        Column::InitialAllocated => format_mib(record.initial_allocated),
    }
}

fn payload(report: &SessionReport) -> ViewPayload<'_> {
    let default_sort = ViewState::default().sort.map(|s| SortSpec {
        key: s.column.key(),
        dir: s.direction.as_str(),
    });

    let rows = report
        .records
        .iter()
        .enumerate()
        .map(|(index, record)| ViewRow {
            index,
            id: &record.id,
            status: record.status.as_str(),
            tier: Tier::of(record.peak_allocated).as_str(),
            monitored: record.monitored,
            incomplete: record.incomplete,
            peak_allocated: record.peak_allocated,
            duration_seconds: record.duration_seconds,
            memory_increase: record.memory_increase,
            peak_reserved: record.peak_reserved,
            initial_allocated: record.initial_allocated,
            display: Column::ALL
                .iter()
                .map(|&c| (c.key(), display_value(record, c)))
                .collect(),
        })
        .collect();

    ViewPayload {
        columns: Column::ALL
            .iter()
            .map(|c| ColumnSpec {
                key: c.key(),
                label: c.label(),
                numeric: c.is_numeric(),
            })
            .collect(),
        default_sort,
        rows,
    }
}

/// Make JSON safe to place inside a `<script>` element.
/// `<`, `>` and `&` only occur inside JSON strings, where `\uXXXX` is valid.
fn embed_json(json: &str) -> String {
    json.replace('<', "\\u003c")
        .replace('>', "\\u003e")
        .replace('&', "\\u0026")
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn write_page(out: &mut String, report: &SessionReport, data: &str) -> std::fmt::Result {
    let summary = &report.summary;
    let total = report.records.len();

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    out.push_str("<meta charset=\"UTF-8\">\n");
    out.push_str("<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n");
    out.push_str("<title>GPU Memory Usage Report</title>\n<style>\n");
    out.push_str(STYLE);
    out.push_str("</style>\n</head>\n<body>\n<div class=\"container\">\n");

    writeln!(out, "<h1>GPU Memory Usage Report</h1>")?;
    writeln!(
        out,
        "<p class=\"timestamp\">Session started: {}</p>",
        format_report_time(&report.started_at)
    )?;

    out.push_str("<div class=\"summary\">\n");
    let (device_name, device_memory) = match &report.device {
        Some(d) => (escape_html(&d.name), format!("{} GiB", format_gib(d.total_memory))),
        None => ("N/A".to_string(), "N/A".to_string()),
    };
    summary_card(out, "GPU Device", &device_name, "")?;
    summary_card(out, "Device Memory", &device_memory, "")?;
    summary_card(out, "Total Tests", &summary.count.to_string(), "")?;
    summary_card(out, "Monitored", &summary.count_monitored.to_string(), "")?;
    summary_card(
        out,
        "Avg Peak Memory",
        &format_mib_f64(summary.average_peak_allocated),
        "MiB",
    )?;
    summary_card(out, "Max Peak Memory", &format_mib(summary.max_peak_allocated), "MiB")?;
    summary_card(
        out,
        "Total Duration",
        &format_seconds(summary.total_duration_seconds),
        "s",
    )?;
    out.push_str("</div>\n");

    writeln!(out, "<h2>Detailed Results</h2>")?;
    out.push_str("<div class=\"controls\">\n");
    out.push_str(
        "<input type=\"text\" id=\"search-box\" class=\"search-box\" placeholder=\"Search tests...\">\n",
    );
    out.push_str("<div class=\"filter-buttons\">\n");
    out.push_str("<button class=\"filter-btn active\" data-tier=\"all\">All</button>\n");
    for tier in Tier::ALL {
        writeln!(
            out,
            "<button class=\"filter-btn\" data-tier=\"{}\">{}</button>",
            tier.as_str(),
            escape_html(tier.label())
        )?;
    }
    out.push_str("</div>\n</div>\n");

    let view = ViewState::default();
    out.push_str("<table id=\"data-table\">\n<thead>\n<tr>\n");
    for column in Column::ALL {
        let class = match view.sort {
            Some(s) if s.column == column => format!(" class=\"sort-{}\"", s.direction.as_str()),
            _ => String::new(),
        };
        writeln!(
            out,
            "<th data-key=\"{}\"{}>{}</th>",
            column.key(),
            class,
            escape_html(column.label())
        )?;
    }
    out.push_str("</tr>\n</thead>\n<tbody id=\"table-body\">\n");

    for index in view.visible(&report.records) {
        let record = &report.records[index];
        let tier = Tier::of(record.peak_allocated).as_str();
        write!(
            out,
            "<tr class=\"tier-{}\" data-tier=\"{}\" data-index=\"{}\">",
            tier, tier, index
        )?;
        for column in Column::ALL {
            let class = if column.is_numeric() { " class=\"num\"" } else { "" };
            write!(
                out,
                "<td{}>{}</td>",
                class,
                escape_html(&display_value(record, column))
            )?;
        }
        out.push_str("</tr>\n");
    }
    out.push_str("</tbody>\n</table>\n");

    let no_results_style = if total == 0 { "block" } else { "none" };
    writeln!(
        out,
        "<div id=\"no-results\" style=\"display: {}\">No tests match your search criteria.</div>",
        no_results_style
    )?;
    writeln!(
        out,
        "<div class=\"stats-footer\">Showing <span id=\"visible-count\">{}</span> of {} tests</div>",
        total, total
    )?;
    out.push_str("</div>\n");

    out.push_str("<script type=\"application/json\" id=\"report-data\">");
    out.push_str(data);
    out.push_str("</script>\n<script>\n");
    out.push_str(SCRIPT);
    out.push_str("</script>\n</body>\n</html>\n");

    Ok(())
}

fn summary_card(out: &mut String, title: &str, value: &str, unit: &str) -> std::fmt::Result {
    write!(
        out,
        "<div class=\"summary-card\"><h3>{}</h3><div class=\"value\">{}",
        title, value
    )?;
    if !unit.is_empty() {
        write!(out, " <span class=\"unit\">{}</span>", unit)?;
    }
    writeln!(out, "</div></div>")
}

const STYLE: &str = r#"* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif; background: #eef1f7; padding: 20px; color: #2d3748; }
.container { max-width: 1400px; margin: 0 auto; background: #fff; padding: 40px; border-radius: 16px; box-shadow: 0 10px 40px rgba(0,0,0,0.15); }
h1 { font-size: 2.2em; margin-bottom: 8px; color: #4c51bf; }
h2 { margin: 10px 0 15px; }
.timestamp { color: #718096; font-size: 0.9em; margin-bottom: 30px; }
.summary { display: grid; grid-template-columns: repeat(auto-fit, minmax(180px, 1fr)); gap: 16px; margin-bottom: 36px; }
.summary-card { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: #fff; padding: 18px; border-radius: 12px; }
.summary-card h3 { font-size: 0.8em; text-transform: uppercase; letter-spacing: 1px; opacity: 0.9; margin-bottom: 8px; }
.summary-card .value { font-size: 1.5em; font-weight: bold; word-break: break-word; }
.summary-card .unit { font-size: 0.55em; }
.controls { display: flex; gap: 15px; align-items: center; flex-wrap: wrap; margin-bottom: 20px; }
.search-box { flex: 1; min-width: 280px; padding: 10px 16px; border: 2px solid #e2e8f0; border-radius: 8px; font-size: 1em; }
.search-box:focus { outline: none; border-color: #667eea; }
.filter-buttons { display: flex; gap: 10px; flex-wrap: wrap; }
.filter-btn { padding: 8px 16px; border: 2px solid #667eea; background: #fff; color: #667eea; border-radius: 8px; cursor: pointer; font-weight: 600; }
.filter-btn:hover, .filter-btn.active { background: #667eea; color: #fff; }
table { width: 100%; border-collapse: collapse; }
th { background: #5a67d8; color: #fff; padding: 12px; text-align: left; cursor: pointer; user-select: none; white-space: nowrap; }
th.sort-asc::after { content: ' \2191'; }
th.sort-desc::after { content: ' \2193'; }
td { padding: 12px; border-bottom: 1px solid #e2e8f0; }
td.num { text-align: right; font-variant-numeric: tabular-nums; }
td:first-child { font-family: 'Courier New', monospace; font-size: 0.9em; word-break: break-all; }
tr:hover td { background: #f7fafc; }
tr.tier-high td { background: #fff5f5; }
tr.tier-high td:nth-child(3) { color: #e53e3e; font-weight: 600; }
tr.tier-medium td { background: #fffaf0; }
tr.tier-medium td:nth-child(3) { color: #dd6b20; font-weight: 600; }
#no-results { text-align: center; padding: 40px; color: #718096; }
.stats-footer { margin-top: 24px; padding: 16px; background: #f7fafc; border-radius: 8px; text-align: center; color: #718096; }
"#;

const SCRIPT: &str = r#"(function () {
  "use strict";
  var payload = JSON.parse(document.getElementById("report-data").textContent);
  var rows = payload.rows;
  var state = { sort: payload.default_sort, tier: "all", query: "" };

  function compare(a, b, key) {
    var x = a[key];
    var y = b[key];
    if (x < y) return -1;
    if (x > y) return 1;
    return 0;
  }

  function matchesTier(row) {
    return state.tier === "all" || row.tier === state.tier;
  }

  function matchesSearch(row) {
    return state.query === "" ||
      row.id.toLowerCase().indexOf(state.query.toLowerCase()) !== -1;
  }

  function visibleRows() {
    var out = rows.filter(function (row) {
      return matchesTier(row) && matchesSearch(row);
    });
    if (state.sort) {
      var key = state.sort.key;
      var sign = state.sort.dir === "asc" ? 1 : -1;
      out.sort(function (a, b) {
        return sign * compare(a, b, key) || a.index - b.index;
      });
    }
    return out;
  }

  function toggleSort(key) {
    if (state.sort && state.sort.key === key) {
      state.sort = { key: key, dir: state.sort.dir === "asc" ? "desc" : "asc" };
    } else {
      state.sort = { key: key, dir: "asc" };
    }
    render();
  }

  function render() {
    var body = document.getElementById("table-body");
    var visible = visibleRows();
    while (body.firstChild) {
      body.removeChild(body.firstChild);
    }
    visible.forEach(function (row) {
      var tr = document.createElement("tr");
      tr.className = "tier-" + row.tier;
      tr.setAttribute("data-tier", row.tier);
      tr.setAttribute("data-index", row.index);
      payload.columns.forEach(function (col) {
        var td = document.createElement("td");
        td.textContent = row.display[col.key];
        if (col.numeric) {
          td.className = "num";
        }
        tr.appendChild(td);
      });
      body.appendChild(tr);
    });

    document.getElementById("visible-count").textContent = visible.length;
    document.getElementById("no-results").style.display = visible.length === 0 ? "block" : "none";
    document.getElementById("data-table").style.display = visible.length === 0 ? "none" : "table";

    document.querySelectorAll("th[data-key]").forEach(function (th) {
      th.classList.remove("sort-asc", "sort-desc");
      if (state.sort && th.getAttribute("data-key") === state.sort.key) {
        th.classList.add("sort-" + state.sort.dir);
      }
    });
    document.querySelectorAll(".filter-btn").forEach(function (btn) {
      btn.classList.toggle("active", btn.getAttribute("data-tier") === state.tier);
    });
  }

  document.querySelectorAll("th[data-key]").forEach(function (th) {
    th.addEventListener("click", function () {
      toggleSort(th.getAttribute("data-key"));
    });
  });
  document.querySelectorAll(".filter-btn").forEach(function (btn) {
    btn.addEventListener("click", function () {
      state.tier = btn.getAttribute("data-tier");
      render();
    });
  });
  document.getElementById("search-box").addEventListener("input", function (e) {
    state.query = e.target.value;
    render();
  });

  render();
})();
"#;
