//! Plain-text rendering shared by the one-shot commands and the chat loop.

use std::fmt::Write;

use tl_core::{
    ClassificationResult, LayoutSnapshot, Message, ProximitySnapshot, SummaryResult,
    TopologyProjector, millis_to_iso8601,
};

pub fn message(msg: &Message) -> String {
    let marker = if msg.urgent { "[URGENT] " } else { "" };
    format!(
        "#{:<4} {} {marker}{}",
        msg.sequence,
        millis_to_iso8601(msg.timestamp_ms),
        msg.text
    )
}

pub fn peers(snapshot: &ProximitySnapshot) -> String {
    let mut out = format!("tick {}", snapshot.tick);
    for peer in &snapshot.peers {
        let _ = write!(out, "  {}: {:.1}m", peer.id, peer.distance);
    }
    out
}

pub fn classification(result: &ClassificationResult) -> String {
    let matched = if result.matched.is_empty() {
        "-".to_string()
    } else {
        result.matched.join(", ")
    };
    format!(
        "label:   {}\nscore:   {:.2}\nmatched: {matched}",
        result.label, result.score
    )
}

pub fn summary(result: &SummaryResult) -> String {
    if result.is_empty() {
        "(nothing to summarize)".to_string()
    } else {
        result.summary.clone()
    }
}

pub fn layout_step(snapshot: &LayoutSnapshot) -> String {
    format!(
        "step {:>3}  alpha {:.4}  moved {:.4}",
        snapshot.iteration, snapshot.alpha, snapshot.max_displacement
    )
}

/// Final node positions followed by each edge's settled length.
pub fn layout(projector: &TopologyProjector) -> String {
    let snapshot = projector.snapshot();
    let mut out = String::new();
    for (id, p) in &snapshot.positions {
        let _ = writeln!(out, "{id:>6}  ({:7.1}, {:7.1})", p.x, p.y);
    }
    for ((a, b), len) in projector
        .graph()
        .edges()
        .iter()
        .zip(projector.edge_lengths())
    {
        let _ = writeln!(out, "{a:>6}-{b:<6} {len:6.1}");
    }
    let _ = write!(
        out,
        "{} iterations, converged: {}",
        snapshot.iteration,
        projector.is_converged()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_core::MessageLog;

    #[test]
    fn test_message_marks_urgent() {
        let mut log = MessageLog::new();
        let calm = log.append_at("all quiet", 0).unwrap();
        let loud = log.append_sos_at(1_000);
        assert_eq!(
            message(&calm),
            "#0    1970-01-01T00:00:00.000Z all quiet"
        );
        assert!(message(&loud).contains("[URGENT] SOS broadcast activated!"));
    }

    #[test]
    fn test_classification_empty_matches() {
        let r = ClassificationResult {
            label: "normal".into(),
            score: 0.1,
            matched: vec![],
        };
        assert_eq!(classification(&r), "label:   normal\nscore:   0.10\nmatched: -");
    }

    #[test]
    fn test_summary_empty() {
        assert_eq!(summary(&SummaryResult::empty()), "(nothing to summarize)");
    }

    #[test]
    fn test_layout_lists_every_edge() {
        let mut p = TopologyProjector::project(["A", "B", "C"], [("A", "B"), ("B", "C")]).unwrap();
        p.run();
        let out = layout(&p);
        assert!(out.contains("A-B"));
        assert!(out.contains("B-C"));
        assert!(out.contains("converged: true"));
    }
}
