/// Axis-aligned box in panel pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn bottom(&self) -> f32 {
        self.y + self.h
    }

    pub fn right(&self) -> f32 {
        self.x + self.w
    }
}

/// Boxes of the print panel:
///
/// ```text
/// +---------------------------------------+
/// | title                                 |
/// +---------------------------+-----------+
/// |                           | mini map  |
/// |        primary map        +-----------+
/// |                           | legend    |
/// |                           | stats     |
/// +---------------------------+-----------+
/// | footer (extent, date)                 |
/// +---------------------------------------+
/// ```
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PanelLayout {
    pub width: u32,
    pub height: u32,
    pub margin: f32,
    pub row_height: f32,
    pub font_size: f32,
    pub title: Rect,
    pub primary: Rect,
    pub mini: Rect,
    pub legend: Rect,
    pub stats: Rect,
    pub footer: Rect,
}

impl PanelLayout {
    /// `primary_aspect` is width / height of the composed primary image.
    pub fn new(width: u32, primary_aspect: f32, legend_rows: usize, stats_rows: usize) -> Self {
        let w = width as f32;
        let margin = (w * 0.02).round();
        let font_size = (w * 0.012).max(10.0).round();
        let row_height = (font_size * 1.6).round();
        let side_w = (w * 0.24).round();
        let aspect = if primary_aspect.is_finite() && primary_aspect > 0.0 {
            primary_aspect
        } else {
            1.0
        };

        let title = Rect {
            x: margin,
            y: margin,
            w: w - 2.0 * margin,
            h: (font_size * 2.6).round(),
        };
        let top = title.bottom() + margin / 2.0;
        let primary_w = w - 3.0 * margin - side_w;
        let primary = Rect {
            x: margin,
            y: top,
            w: primary_w,
            h: (primary_w / aspect).round(),
        };
        let side_x = primary.right() + margin;
        let mini = Rect {
            x: side_x,
            y: top,
            w: side_w,
            h: side_w,
        };
        let legend = Rect {
            x: side_x,
            y: mini.bottom() + margin / 2.0,
            w: side_w,
            h: row_height * (legend_rows as f32 + 1.0),
        };
        let stats = Rect {
            x: side_x,
            y: legend.bottom() + margin / 2.0,
            w: side_w,
            h: row_height * (stats_rows as f32 + 1.0),
        };
        let body_bottom = primary.bottom().max(stats.bottom());
        let footer = Rect {
            x: margin,
            y: body_bottom + margin / 2.0,
            w: w - 2.0 * margin,
            h: row_height,
        };
        let height = (footer.bottom() + margin).ceil() as u32;
        Self {
            width,
            height,
            margin,
            row_height,
            font_size,
            title,
            primary,
            mini,
            legend,
            stats,
            footer,
        }
    }
}
