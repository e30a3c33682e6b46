//! Minimal SDP parsing: enough to find the sendonly PCMA/8000 audio track
//! and its control URI.

/// A parsed `m=audio` media block relevant to backchannel setup.
#[derive(Debug, Clone)]
pub struct AudioTrack {
    pub sendonly: bool,
    pub has_pcma_8000: bool,
    pub control: Option<String>,
}

/// Parses an SDP body into its `m=audio` blocks.
///
/// Each block runs from one `m=audio` line up to (but not including) the
/// next `m=` line or the end of the document.
pub fn parse_audio_tracks(sdp: &str) -> Vec<AudioTrack> {
    let lines: Vec<&str> = sdp.lines().collect();
    let mut tracks = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        if lines[i].starts_with("m=audio") {
            let mut track = AudioTrack {
                sendonly: false,
                has_pcma_8000: false,
                control: None,
            };
            let mut j = i + 1;
            while j < lines.len() && !lines[j].starts_with("m=") {
                let line = lines[j].trim();
                if line == "a=sendonly" {
                    track.sendonly = true;
                } else if line.starts_with("a=rtpmap") && line.contains("PCMA/8000") {
                    track.has_pcma_8000 = true;
                } else if let Some(rest) = line.strip_prefix("a=control:") {
                    track.control = Some(rest.trim().to_string());
                }
                j += 1;
            }
            tracks.push(track);
            i = j;
        } else {
            i += 1;
        }
    }

    tracks
}

/// Finds the sendonly PCMA/8000 track's control token among the parsed
/// tracks, if any.
pub fn find_backchannel_control(tracks: &[AudioTrack]) -> Option<&str> {
    tracks
        .iter()
        .find(|t| t.sendonly && t.has_pcma_8000)
        .and_then(|t| t.control.as_deref())
}
