//! TUI rendering.
//!
//! ┌──────────────────────────────────────────────────────────┐
//! │  hostwatch  http://10.0.0.7:5000  ● connected  #42       │
//! ├─────────────┬─────────────┬─────────────┬────────────────┤
//! │ CPU         │ Memory      │ Disk        │ Processes      │
//! │ ████ 23.0%  │ ██████ 61%  │ ███ 40.2%   │ ████████ 312   │
//! ├─────────────┴─────────────┼─────────────┴────────────────┤
//! │  Cores                    │  Memory / Disk               │
//! │  0 ███▌        31.0%      │  used 7.6 GiB  avail 4.4 GiB │
//! ├───────────────────────────┴──────────────────────────────┤
//! │  Processes (sort: cpu)         shown with p              │
//! ├──────────────────────────────────────────────────────────┤
//! │  q quit  p processes  s sort  r reconnect  d disconnect  │
//! └──────────────────────────────────────────────────────────┘

use super::app::App;
use hostwatch_core::{
    ConnectionStatus, DashboardFrame, GaugeMetric, GaugeReading, derive, format_bytes,
    top_processes,
};
use ratatui::{prelude::*, widgets::*};

/// Width of the per-core load bars, in cells.
const CORE_BAR_WIDTH: usize = 20;

pub fn draw(f: &mut Frame, app: &App, frame: &DashboardFrame) {
    let detail_height = if frame.show_process_detail {
        Constraint::Min(8)
    } else {
        Constraint::Length(0)
    };
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // title
            Constraint::Length(4), // gauges
            Constraint::Min(6),    // cores + details
            detail_height,         // processes
            Constraint::Length(1), // keys
        ])
        .split(f.area());

    draw_title(f, rows[0], app, frame);
    draw_gauges(f, rows[1], frame);
    draw_main(f, rows[2], frame);
    if frame.show_process_detail {
        draw_processes(f, rows[3], app, frame);
    }
    draw_keys(f, rows[4]);
}

fn draw_title(f: &mut Frame, area: Rect, app: &App, frame: &DashboardFrame) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(" hostwatch ", Style::default().bold().fg(Color::Cyan)),
            Span::raw(format!(" {} ", app.endpoint())),
            Span::styled(
                format!(" ● {} ", frame.status),
                Style::default().bold().fg(status_color(frame.status)),
            ),
            Span::styled(
                format!("  #{}  every {}ms ", frame.revision, app.refresh_ms()),
                Style::default().fg(Color::DarkGray),
            ),
        ]));

    f.render_widget(block, area);
}

fn draw_gauges(f: &mut Frame, area: Rect, frame: &DashboardFrame) {
    if frame.gauges.is_empty() {
        return;
    }
    let constraints: Vec<Constraint> = frame
        .gauges
        .iter()
        .map(|_| Constraint::Ratio(1, frame.gauges.len() as u32))
        .collect();
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (reading, col) in frame.gauges.iter().zip(cols.iter()) {
        let gauge = Gauge::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!(" {} ", reading.label)),
            )
            .gauge_style(Style::default().fg(load_color(reading.state.percent)))
            .ratio((reading.state.percent / 100.0).clamp(0.0, 1.0))
            .label(gauge_label(reading));
        f.render_widget(gauge, *col);
    }
}

fn draw_main(f: &mut Frame, area: Rect, frame: &DashboardFrame) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    draw_cores(f, cols[0], frame);
    draw_details(f, cols[1], frame);
}

fn draw_cores(f: &mut Frame, area: Rect, frame: &DashboardFrame) {
    let lines: Vec<Line> = match frame.snapshot.cpu_core_loads.as_deref() {
        Some(cores) if !cores.is_empty() => cores
            .iter()
            .enumerate()
            .map(|(i, &load)| {
                Line::from(vec![
                    Span::styled(format!("{i:>3} "), Style::default().fg(Color::DarkGray)),
                    Span::styled(
                        load_bar(load, CORE_BAR_WIDTH),
                        Style::default().fg(load_color(load)),
                    ),
                    Span::raw(format!(" {load:>5.1}%")),
                ])
            })
            .collect(),
        _ => vec![Line::from(Span::styled(
            "waiting for cpu data",
            Style::default().fg(Color::DarkGray),
        ))],
    };

    let title = cores_title(frame);
    let p = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(p, area);
}

fn draw_details(f: &mut Frame, area: Rect, frame: &DashboardFrame) {
    let snapshot = &frame.snapshot;
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = Vec::new();

    lines.push(Line::from(Span::styled("Memory", Style::default().bold())));
    match snapshot.memory.as_ref() {
        Some(memory) => {
            lines.push(Line::from(format!(
                "  used {}  available {}",
                bytes_or_dash(memory.used),
                bytes_or_dash(memory.available)
            )));
            if let Some(total) = derive::memory_total(snapshot) {
                lines.push(Line::from(Span::styled(
                    format!("  total {}", format_bytes(total)),
                    dim,
                )));
            }
        }
        None => lines.push(Line::from(Span::styled("  —", dim))),
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Disk", Style::default().bold())));
    match snapshot.disk.as_ref() {
        Some(disk) => {
            lines.push(Line::from(format!(
                "  used {}  free {}",
                bytes_or_dash(disk.used),
                bytes_or_dash(disk.free)
            )));
            if let Some(total) = derive::disk_total(snapshot) {
                lines.push(Line::from(Span::styled(
                    format!("  total {}", format_bytes(total)),
                    dim,
                )));
            }
            lines.push(Line::from(Span::styled(
                format!(
                    "  reads {}  writes {}",
                    count_or_dash(disk.read_count),
                    count_or_dash(disk.write_count)
                ),
                dim,
            )));
        }
        None => lines.push(Line::from(Span::styled("  —", dim))),
    }

    let p = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Details "));
    f.render_widget(p, area);
}

fn draw_processes(f: &mut Frame, area: Rect, app: &App, frame: &DashboardFrame) {
    let visible = area.height.saturating_sub(3) as usize;
    let skip = app.scroll_for(frame);
    let processes = top_processes(&frame.snapshot, app.sort(), skip + visible);

    let rows: Vec<Row> = processes
        .iter()
        .skip(skip)
        .map(|p| {
            Row::new(vec![
                p.pid.to_string(),
                p.name.clone().unwrap_or_else(|| "?".into()),
                percent_or_dash(p.cpu_percent),
                percent_or_dash(p.memory_percent),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(8),  // pid
            Constraint::Min(16),    // name
            Constraint::Length(8),  // cpu
            Constraint::Length(8),  // mem
        ],
    )
    .header(
        Row::new(vec!["PID", "NAME", "CPU%", "MEM%"])
            .style(Style::default().bold().fg(Color::Cyan)),
    )
    .block(Block::default().borders(Borders::ALL).title(format!(
        " Processes ({})  sort: {} ",
        frame.process_count,
        app.sort().label()
    )));

    f.render_widget(table, area);
}

fn draw_keys(f: &mut Frame, area: Rect) {
    let bar = Paragraph::new(
        " q: quit   p: processes   s: sort   ↑↓: scroll   r: reconnect   d: disconnect",
    )
    .style(Style::default().bg(Color::DarkGray).fg(Color::White));
    f.render_widget(bar, area);
}

fn cores_title(frame: &DashboardFrame) -> String {
    format!(
        " Cores ({})  avg {:.1}% ",
        derive::core_count(&frame.snapshot),
        frame.average_cpu
    )
}

/// Numeric label plus needle angle, or a dash before the field arrives.
pub fn gauge_label(reading: &GaugeReading) -> String {
    if !reading.available {
        return "—".to_string();
    }
    let value = if reading.metric == GaugeMetric::Processes {
        format!("{}", reading.value as u64)
    } else {
        format!("{:.1}%", reading.value)
    };
    format!("{value}  ∠{:.0}°", reading.state.angle_degrees)
}

pub fn load_bar(percent: f64, width: usize) -> String {
    let clamped = if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) };
    let filled = ((clamped / 100.0) * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

fn load_color(percent: f64) -> Color {
    if percent >= 85.0 {
        Color::Red
    } else if percent >= 60.0 {
        Color::Yellow
    } else {
        Color::Green
    }
}

fn status_color(status: ConnectionStatus) -> Color {
    match status {
        ConnectionStatus::Connected => Color::Green,
        ConnectionStatus::Connecting => Color::Yellow,
        ConnectionStatus::Disconnected => Color::Red,
    }
}

fn bytes_or_dash(bytes: Option<u64>) -> String {
    bytes.map(format_bytes).unwrap_or_else(|| "—".into())
}

fn count_or_dash(count: Option<u64>) -> String {
    count.map(|c| c.to_string()).unwrap_or_else(|| "—".into())
}

fn percent_or_dash(percent: Option<f64>) -> String {
    percent
        .map(|p| format!("{p:.1}"))
        .unwrap_or_else(|| "—".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hostwatch_core::{GaugeDescriptor, MetricsSnapshot, read_gauge};

    #[test]
    fn load_bar_fills_proportionally() {
        assert_eq!(load_bar(0.0, 4), "░░░░");
        assert_eq!(load_bar(50.0, 4), "██░░");
        assert_eq!(load_bar(100.0, 4), "████");
        assert_eq!(load_bar(250.0, 4), "████");
        assert_eq!(load_bar(f64::NAN, 4), "░░░░");
    }

    #[test]
    fn gauge_label_shows_value_and_angle() {
        let snapshot = MetricsSnapshot {
            cpu_core_loads: Some(vec![50.0]),
            ..Default::default()
        };
        let reading = read_gauge(&snapshot, &GaugeDescriptor::new(GaugeMetric::Cpu));
        assert_eq!(gauge_label(&reading), "50.0%  ∠90°");

        let missing = read_gauge(&snapshot, &GaugeDescriptor::new(GaugeMetric::Disk));
        assert_eq!(gauge_label(&missing), "—");
    }

    #[test]
    fn cores_title_counts_reported_cores() {
        let snapshot = MetricsSnapshot {
            cpu_core_loads: Some(vec![10.0, 20.0, 30.0]),
            ..Default::default()
        };
        let frame = DashboardFrame {
            status: ConnectionStatus::Connected,
            revision: 1,
            average_cpu: derive::average_cpu(&snapshot),
            process_count: 0,
            gauges: Vec::new(),
            snapshot,
            show_process_detail: false,
        };
        assert_eq!(cores_title(&frame), " Cores (3)  avg 20.0% ");
    }

    #[test]
    fn process_gauge_label_is_a_count() {
        let snapshot = MetricsSnapshot {
            processes: Some(vec![]),
            ..Default::default()
        };
        let reading = read_gauge(&snapshot, &GaugeDescriptor::new(GaugeMetric::Processes));
        assert_eq!(gauge_label(&reading), "0  ∠-45°");
    }
}
