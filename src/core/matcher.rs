use crate::core::cue::Cue;

/// Nearest-cue fallback only applies below this distance (seconds)
pub const SNAP_TOLERANCE: f64 = 1.0;

/// Find the cue for a playback timestamp.
///
/// Returns the first cue containing `t`. Otherwise the cue whose nearer edge is
/// closest to `t`, as long as that distance is under [`SNAP_TOLERANCE`]. Ties go
/// to the cue encountered first.
pub fn match_cue(cues: &[Cue], t: f64) -> Option<&Cue> {
    if let Some(cue) = cues.iter().find(|cue| cue.contains(t)) {
        return Some(cue);
    }

    let mut nearest: Option<(&Cue, f64)> = None;
    for cue in cues {
        let distance = cue.edge_distance(t);
        match nearest {
            Some((_, best)) if distance >= best => {}
            _ => nearest = Some((cue, distance)),
        }
    }

    nearest
        .filter(|(_, distance)| *distance < SNAP_TOLERANCE)
        .map(|(cue, _)| cue)
}
