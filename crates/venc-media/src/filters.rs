//! Thumbnail composition filters.
//!
//! Every preview is rendered into the same fixed box. Landscape frames are
//! letterboxed; portrait frames sit on a blurred, cropped copy of themselves.

use venc_models::encoding::{THUMBNAIL_HEIGHT, THUMBNAIL_WIDTH};

/// Label of the filter graph output for portrait composition.
pub const PORTRAIT_OUTPUT_LABEL: &str = "outv";

/// Frame orientation. Square frames count as landscape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Landscape,
    Portrait,
}

impl Orientation {
    /// Portrait when height > width.
    pub fn from_dimensions(width: u32, height: u32) -> Self {
        if height > width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Orientation::Landscape => "letterbox",
            Orientation::Portrait => "portrait blur",
        }
    }
}

/// A filter ready to attach to an [`FfmpegCommand`](crate::command::FfmpegCommand).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositionFilter {
    /// Single-input chain passed with `-vf`
    Chain(String),
    /// Labelled graph passed with `-filter_complex` and `-map`
    Graph { graph: String, output_label: &'static str },
}

impl CompositionFilter {
    /// Composition filter for the standard preview box.
    pub fn for_orientation(orientation: Orientation) -> Self {
        match orientation {
            Orientation::Landscape => {
                CompositionFilter::Chain(letterbox_filter(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT))
            }
            Orientation::Portrait => CompositionFilter::Graph {
                graph: portrait_blur_graph(THUMBNAIL_WIDTH, THUMBNAIL_HEIGHT),
                output_label: PORTRAIT_OUTPUT_LABEL,
            },
        }
    }

    /// Attach this filter to a command.
    pub fn apply(&self, cmd: crate::command::FfmpegCommand) -> crate::command::FfmpegCommand {
        match self {
            CompositionFilter::Chain(chain) => cmd.video_filter(chain.clone()),
            CompositionFilter::Graph { graph, output_label } => {
                cmd.filter_complex(graph.clone(), output_label)
            }
        }
    }
}

/// Fit inside the box, then pad with black bars to fill it exactly.
pub fn letterbox_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black",
        w = width,
        h = height
    )
}

/// Blurred full-box background with the uncropped frame centered on top.
pub fn portrait_blur_graph(width: u32, height: u32) -> String {
    format!(
        concat!(
            "[0:v]scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},boxblur=20:1[bg];",
            "[0:v]scale=-2:{h}:force_original_aspect_ratio=decrease[fg];",
            "[bg][fg]overlay=(W-w)/2:(H-h)/2[{label}]"
        ),
        w = width,
        h = height,
        label = PORTRAIT_OUTPUT_LABEL
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::FfmpegCommand;

    #[test]
    fn test_orientation_routing() {
        assert_eq!(Orientation::from_dimensions(1920, 1080), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(1080, 1080), Orientation::Landscape);
        assert_eq!(Orientation::from_dimensions(1080, 1920), Orientation::Portrait);
        assert_eq!(Orientation::from_dimensions(719, 720), Orientation::Portrait);
    }

    #[test]
    fn test_letterbox_filter() {
        assert_eq!(
            letterbox_filter(640, 360),
            "scale=640:360:force_original_aspect_ratio=decrease,pad=640:360:(ow-iw)/2:(oh-ih)/2:black"
        );
    }

    #[test]
    fn test_portrait_graph() {
        let graph = portrait_blur_graph(640, 360);
        assert!(graph.starts_with("[0:v]scale=640:360:force_original_aspect_ratio=increase,crop=640:360,boxblur=20:1[bg];"));
        assert!(graph.contains("[0:v]scale=-2:360:force_original_aspect_ratio=decrease[fg]"));
        assert!(graph.ends_with("overlay=(W-w)/2:(H-h)/2[outv]"));
    }

    #[test]
    fn test_apply_uses_map_for_graph() {
        let portrait = CompositionFilter::for_orientation(Orientation::Portrait)
            .apply(FfmpegCommand::new("a", "b"))
            .build_args();
        assert!(portrait.contains(&"-filter_complex".to_string()));
        assert!(portrait.contains(&"[outv]".to_string()));

        let landscape = CompositionFilter::for_orientation(Orientation::Landscape)
            .apply(FfmpegCommand::new("a", "b"))
            .build_args();
        assert!(landscape.contains(&"-vf".to_string()));
        assert!(!landscape.contains(&"-map".to_string()));
    }
}
