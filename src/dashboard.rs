// Terminal rendering of the live dashboard

use crate::health::BackendHealth;
use crate::session::{Alert, Detection, DisplayState, Outcome};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

const BAR_WIDTH: usize = 30;

pub fn progress_bar(progress: u32) -> String {
    let clamped = progress.min(100) as usize;
    let filled = clamped * BAR_WIDTH / 100;
    format!(
        "[{}{}] {}%",
        "#".repeat(filled),
        "-".repeat(BAR_WIDTH - filled),
        progress
    )
}

pub fn health_indicator(health: &BackendHealth) -> String {
    match health {
        BackendHealth::Unknown => "backend: checking".to_string(),
        BackendHealth::Available { active_sessions } => {
            format!("backend: online ({} active sessions)", active_sessions)
        }
        BackendHealth::Unavailable => "backend: OFFLINE".to_string(),
    }
}

pub fn detection_line(detection: &Detection) -> String {
    let marker = if detection.is_drowning() { "[DROWNING] " } else { "" };
    format!(
        "{}{} ({:.1}%)  Frame {} ({}s)",
        marker,
        detection.label_or_unknown(),
        detection.confidence * 100.0,
        detection.frame,
        detection.timestamp
    )
}

/// One-line status used while streaming
pub fn status_line(display: &DisplayState) -> String {
    let drowning = if display.drowning_highlighted() {
        format!("DROWNING {}", display.drowning_count)
    } else {
        format!("drowning {}", display.drowning_count)
    };
    format!(
        "{} {}  frame {}/{}  {}  [{}]",
        progress_bar(display.progress),
        display.status.text(),
        display.current_frame,
        display.total_frames,
        drowning,
        display.status.css_class()
    )
}

pub fn render(display: &DisplayState, health: &BackendHealth) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", health_indicator(health));
    let _ = writeln!(out, "Status: {}", display.status.text());
    if let Some(message) = &display.error_message {
        let _ = writeln!(out, "  {}", message);
    }
    let _ = writeln!(out, "Progress: {}", progress_bar(display.progress));
    let _ = writeln!(
        out,
        "Frame: {} / {}",
        display.current_frame, display.total_frames
    );
    let highlight = if display.drowning_highlighted() { " (!)" } else { "" };
    let _ = writeln!(out, "Drowning detections: {}{}", display.drowning_count, highlight);

    if display.detections.is_empty() {
        let _ = writeln!(out, "Recent detections: none");
    } else {
        let _ = writeln!(out, "Recent detections:");
        for detection in &display.detections {
            let _ = writeln!(out, "  {}", detection_line(detection));
        }
    }

    out
}

pub fn describe_alert(alert: &Alert) -> String {
    match alert {
        Alert::Drowning { frame, total } => {
            let frame = frame.map(|f| f.to_string()).unwrap_or_else(|| "?".to_string());
            format!(
                "\u{1f6a8} DROWNING DETECTED! Frame: {}, Total Detections: {}",
                frame, total
            )
        }
        Alert::InstantDrowning {
            detection,
            high_confidence: true,
        } => format!(
            "\u{1f6a8} HIGH CONFIDENCE DROWNING! Frame: {}, Confidence: {:.1}%",
            detection.frame,
            detection.confidence * 100.0
        ),
        Alert::InstantDrowning { detection, .. } => format!(
            "Possible drowning at frame {} ({:.1}%)",
            detection.frame,
            detection.confidence * 100.0
        ),
    }
}

pub fn describe_outcome(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Completed(summary) => {
            let mut line = format!(
                "Detection completed: {} drowning detections",
                summary.drowning_count
            );
            if let Some(total) = summary.total_detections {
                let _ = write!(line, " ({} detections overall)", total);
            }
            match summary.result {
                Some(true) => line.push_str(", drowning confirmed"),
                Some(false) => line.push_str(", no drowning confirmed"),
                None => {}
            }
            line
        }
        Outcome::Errored(message) => format!("Detection error: {}", message),
        Outcome::Lost(reason) => format!("Connection to server lost ({})", reason),
    }
}

/// Decode the current frame and overwrite `path` with it.
///
/// Returns `Ok(false)` when there is no frame to write.
pub fn write_frame(display: &DisplayState, path: &Path) -> std::io::Result<bool> {
    let Some(frame_data) = display.frame_data.as_deref() else {
        return Ok(false);
    };

    let bytes = BASE64_STANDARD
        .decode(frame_data)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    fs::write(path, bytes)?;
    Ok(true)
}
