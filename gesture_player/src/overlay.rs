//! Software-rendered overlay using `minifb`.
//!
//! Layout:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ ▐▌  NEXT SONG                                  source: sim   │
//! │ ▐▌                                                           │
//! │ ▐▌       [left hand + label]      [right hand + label]       │
//! │ ▐▌ volume                                                    │
//! │ Volume: 50%                                                  │
//! ├──────────────────────────────────────────────────────────────┤
//! │ 2/7 track title                     PLAYING                  │
//! │ key legend                                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! With the simulator source the window also turns key presses into
//! [`SimInput`]s.  Rendering goes through [`Canvas`], which knows nothing
//! about the window, so it can be drawn in tests.

use std::sync::mpsc::Sender;
use std::time::Duration;

use minifb::{Key, KeyRepeat, Window, WindowOptions};

use gesture_core::{GestureLabel, Handedness, LandmarkPoint};

use crate::error::StartupError;
use crate::source::{SimHeld, SimInput};

// ════════════════════════════════════════════════════════════════════════════
// Layout constants
// ════════════════════════════════════════════════════════════════════════════

pub const WIN_W:     usize = 960;
pub const WIN_H:     usize = 600;
const VIEW_H:        usize = 520;
const STATUS_Y:      usize = VIEW_H;
const BAR_X:         usize = 24;
const BAR_Y:         usize = 120;
const BAR_W:         usize = 28;
const BAR_H:         usize = 240;
const BG_COLOR:      u32   = 0xFF1A1A2E;
const STATUS_BG:     u32   = 0xFF0F3460;
const MESSAGE_COLOR: u32   = 0xFF39FF14;
const VOLUME_COLOR:  u32   = 0xFFFF00FF;
const BONE_COLOR:    u32   = 0xFFEEEEEE;
const JOINT_COLOR:   u32   = 0xFFFF4040;
const LEFT_COLOR:    u32   = 0xFFAADDFF;
const RIGHT_COLOR:   u32   = 0xFFFFBBAA;

/// Landmark pairs drawn as bones.
const HAND_BONES: [(usize, usize); 21] = [
    (0, 1), (1, 2), (2, 3), (3, 4),
    (0, 5), (5, 6), (6, 7), (7, 8),
    (5, 9), (9, 10), (10, 11), (11, 12),
    (9, 13), (13, 14), (14, 15), (15, 16),
    (13, 17), (0, 17), (17, 18), (18, 19), (19, 20),
];

const LEGEND: &str = "left/right=wave  o=ok  p+up/down=pinch  q=quit";

// ════════════════════════════════════════════════════════════════════════════
// FeedbackView / FeedbackSink
// ════════════════════════════════════════════════════════════════════════════

/// One hand as the overlay shows it.
#[derive(Clone, Debug, PartialEq)]
pub struct HandView {
    pub handedness: Handedness,
    pub landmarks:  Vec<LandmarkPoint>,
    pub label:      GestureLabel,
}

/// Everything drawn for one frame.  Built by the app; never read back.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeedbackView {
    pub hands:    Vec<HandView>,
    /// Transient command message, already expired by the app.
    pub message:  Option<String>,
    /// Current volume in [0, 1].
    pub volume:   f32,
    /// Title of the cursor track.
    pub track:    Option<String>,
    /// 1-based cursor position and playlist length.
    pub position: Option<(usize, usize)>,
    pub playing:  bool,
    pub source:   &'static str,
}

/// Where the app sends visual feedback.  Purely observational; the only
/// thing flowing back is the quit request.
pub trait FeedbackSink {
    /// Poll user input.  Returns false once the user asked to quit.
    fn poll(&mut self) -> bool;
    fn present(&mut self, view: &FeedbackView);
}

/// Feedback sink for `--headless` runs.
#[derive(Debug, Default)]
pub struct NullFeedback;

impl FeedbackSink for NullFeedback {
    fn poll(&mut self) -> bool { true }
    fn present(&mut self, _view: &FeedbackView) {}
}

// ════════════════════════════════════════════════════════════════════════════
// Overlay
// ════════════════════════════════════════════════════════════════════════════

pub struct Overlay {
    window:   Window,
    canvas:   Canvas,
    /// Present only when the simulator is the landmark source.
    sim_tx:   Option<Sender<SimInput>>,
}

impl Overlay {
    pub fn new(sim_tx: Option<Sender<SimInput>>) -> Result<Self, StartupError> {
        let mut window = Window::new(
            "Gesture Player",
            WIN_W, WIN_H,
            WindowOptions {
                resize: false,
                ..WindowOptions::default()
            },
        ).map_err(|e| StartupError::Window(e.to_string()))?;

        window.limit_update_rate(Some(Duration::from_millis(16)));

        Ok(Overlay {
            window,
            canvas: Canvas::new(WIN_W, WIN_H),
            sim_tx,
        })
    }

    /// Poll keyboard inputs and, for the simulator, translate to SimInput.
    pub fn poll_input(&mut self) -> bool {
        if !self.window.is_open() { return false; }
        if self.window.is_key_pressed(Key::Q, KeyRepeat::No) { return false; }

        let Some(tx) = &self.sim_tx else { return true };

        // The right hand sweeping leftward is "next", so the left arrow
        // drives the right hand.
        if self.window.is_key_pressed(Key::Left, KeyRepeat::No) {
            let _ = tx.send(SimInput::Sweep(Handedness::Right));
        }
        if self.window.is_key_pressed(Key::Right, KeyRepeat::No) {
            let _ = tx.send(SimInput::Sweep(Handedness::Left));
        }
        let held = SimHeld {
            ok:     self.window.is_key_down(Key::O),
            pinch:  self.window.is_key_down(Key::P),
            widen:  self.window.is_key_down(Key::Up),
            narrow: self.window.is_key_down(Key::Down),
        };
        let _ = tx.send(SimInput::Held(held));
        true
    }
}

impl FeedbackSink for Overlay {
    fn poll(&mut self) -> bool {
        self.poll_input()
    }

    fn present(&mut self, view: &FeedbackView) {
        self.canvas.render(view);
        self.window.update_with_buffer(&self.canvas.buf, WIN_W, WIN_H).ok();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Canvas: the pixel buffer and everything drawn on it
// ════════════════════════════════════════════════════════════════════════════

pub struct Canvas {
    buf: Vec<u32>,
    w:   usize,
    h:   usize,
}

impl Canvas {
    pub fn new(w: usize, h: usize) -> Self {
        Canvas { buf: vec![BG_COLOR; w * h], w, h }
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.w && y < self.h).then(|| self.buf[y * self.w + x])
    }

    /// Render one frame.
    pub fn render(&mut self, view: &FeedbackView) {
        self.buf.fill(BG_COLOR);

        // ── Hands ─────────────────────────────────────────────────────────
        for hand in &view.hands {
            self.draw_hand(hand);
        }

        // ── Message ───────────────────────────────────────────────────────
        if let Some(msg) = &view.message {
            self.draw_label(msg, BAR_X + BAR_W + 24, 24, MESSAGE_COLOR, 5);
        }
        let src = format!("source: {}", view.source);
        self.draw_label(&src, WIN_W.saturating_sub(text_width(&src, 2) + 16), 16, 0xFF888888, 2);

        // ── Volume bar ────────────────────────────────────────────────────
        self.draw_volume(view.volume);

        // ── Status bar ────────────────────────────────────────────────────
        self.fill_rect(0, STATUS_Y, self.w, self.h - STATUS_Y, STATUS_BG);
        let track = match (&view.track, view.position) {
            (Some(title), Some((n, len))) => format!("{}/{} {}", n, len, title),
            _ => "no songs".to_string(),
        };
        self.draw_label(&track, 10, STATUS_Y + 12, 0xFFEEEEEE, 3);
        let state = if view.playing { "PLAYING" } else { "PAUSED" };
        self.draw_label(state, self.w.saturating_sub(text_width(state, 3) + 16), STATUS_Y + 12, 0xFFFFD700, 3);

        // ── Key legend ────────────────────────────────────────────────────
        self.draw_label(LEGEND, 10, self.h.saturating_sub(22), 0xFF888888, 2);
    }

    // ── Hand ──────────────────────────────────────────────────────────────

    fn draw_hand(&mut self, hand: &HandView) {
        let px: Vec<(isize, isize)> = hand.landmarks.iter()
            .map(|p| to_view(p, self.w, VIEW_H))
            .collect();

        for &(a, b) in &HAND_BONES {
            if let (Some(&pa), Some(&pb)) = (px.get(a), px.get(b)) {
                self.draw_line(pa, pb, BONE_COLOR);
            }
        }
        for &(x, y) in &px {
            self.fill_square(x, y, 2, JOINT_COLOR);
        }

        // Label above the wrist.
        if let Some(&(x, y)) = px.first() {
            let color = match hand.handedness {
                Handedness::Left  => LEFT_COLOR,
                Handedness::Right => RIGHT_COLOR,
            };
            let text = format!("{} {}", hand.handedness.name(), hand.label);
            let lx = (x - 40).max(0) as usize;
            let ly = (y + 16).max(0) as usize;
            self.draw_label(&text, lx, ly, color, 2);
        }
    }

    // ── Volume ────────────────────────────────────────────────────────────

    fn draw_volume(&mut self, volume: f32) {
        let level = if volume.is_finite() { volume.clamp(0.0, 1.0) } else { 0.0 };
        let filled = (BAR_H as f32 * level).round() as usize;

        self.draw_border(BAR_X, BAR_Y, BAR_W, BAR_H, VOLUME_COLOR);
        self.fill_rect(BAR_X, BAR_Y + BAR_H - filled, BAR_W, filled, VOLUME_COLOR);
        let text = volume_text(level);
        self.draw_label(&text, BAR_X, BAR_Y + BAR_H + 12, VOLUME_COLOR, 3);
    }

    // ── Primitive drawing helpers ─────────────────────────────────────────

    fn fill_rect(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        for row in y..(y+h).min(self.h) {
            for col in x..(x+w).min(self.w) {
                self.buf[row * self.w + col] = color;
            }
        }
    }

    fn draw_border(&mut self, x: usize, y: usize, w: usize, h: usize, color: u32) {
        if w == 0 || h == 0 { return; }
        for col in x..(x+w).min(self.w) {
            self.set_pixel(col, y, color);
            self.set_pixel(col, y+h-1, color);
        }
        for row in y..(y+h).min(self.h) {
            self.set_pixel(x, row, color);
            self.set_pixel(x+w-1, row, color);
        }
    }

    fn set_pixel(&mut self, x: usize, y: usize, color: u32) {
        if x < self.w && y < self.h {
            self.buf[y * self.w + x] = color;
        }
    }

    fn set_pixel_signed(&mut self, x: isize, y: isize, color: u32) {
        if x >= 0 && y >= 0 {
            self.set_pixel(x as usize, y as usize, color);
        }
    }

    fn fill_square(&mut self, cx: isize, cy: isize, r: isize, color: u32) {
        for dy in -r..=r {
            for dx in -r..=r {
                self.set_pixel_signed(cx.saturating_add(dx), cy.saturating_add(dy), color);
            }
        }
    }

    fn draw_line(&mut self, (x0, y0): (isize, isize), (x1, y1): (isize, isize), color: u32) {
        let (dx, dy) = (x1.saturating_sub(x0), y1.saturating_sub(y0));
        let steps = dx.saturating_abs().max(dy.saturating_abs()).max(1);
        // Wildly out-of-frame landmarks are not worth walking.
        if steps > 4 * (self.w + self.h) as isize { return; }
        for i in 0..=steps {
            let x = x0 + dx * i / steps;
            let y = y0 + dy * i / steps;
            self.set_pixel_signed(x, y, color);
        }
    }

    /// Minimal bitmap font, 3×5 glyphs magnified by `scale`.
    fn draw_label(&mut self, text: &str, x: usize, y: usize, color: u32, scale: usize) {
        let mut cx = x;
        for ch in text.chars() {
            let glyph = char_glyph(ch);
            for (row, &bits) in glyph.iter().enumerate() {
                for col in 0..3usize {
                    if bits & (1 << (2 - col)) != 0 {
                        self.fill_rect(cx + col * scale, y + row * scale, scale, scale, color);
                    }
                }
            }
            cx += 4 * scale; // 3 wide + 1 gap
            if cx + 4 * scale > self.w { break; }
        }
    }
}

/// Normalised image coordinates to pixels in the hand view.
fn to_view(p: &LandmarkPoint, w: usize, h: usize) -> (isize, isize) {
    ((p.x * w as f32) as isize, (p.y * h as f32) as isize)
}

fn text_width(text: &str, scale: usize) -> usize {
    text.chars().count() * 4 * scale
}

pub fn volume_text(level: f32) -> String {
    format!("Volume: {}%", (level * 100.0).round() as u32)
}

// ────────────────────────────────────────────────────────────────────────────
// Minimal 3×5 bitmap font
// ────────────────────────────────────────────────────────────────────────────

fn char_glyph(c: char) -> [u8; 5] {
    match c {
        '0' => [0b111, 0b101, 0b101, 0b101, 0b111],
        '1' => [0b010, 0b110, 0b010, 0b010, 0b111],
        '2' => [0b111, 0b001, 0b111, 0b100, 0b111],
        '3' => [0b111, 0b001, 0b111, 0b001, 0b111],
        '4' => [0b101, 0b101, 0b111, 0b001, 0b001],
        '5' => [0b111, 0b100, 0b111, 0b001, 0b111],
        '6' => [0b111, 0b100, 0b111, 0b101, 0b111],
        '7' => [0b111, 0b001, 0b001, 0b001, 0b001],
        '8' => [0b111, 0b101, 0b111, 0b101, 0b111],
        '9' => [0b111, 0b101, 0b111, 0b001, 0b111],
        'a' | 'A' => [0b111, 0b101, 0b111, 0b101, 0b101],
        'b' | 'B' => [0b110, 0b101, 0b110, 0b101, 0b110],
        'c' | 'C' => [0b111, 0b100, 0b100, 0b100, 0b111],
        'd' | 'D' => [0b110, 0b101, 0b101, 0b101, 0b110],
        'e' | 'E' => [0b111, 0b100, 0b111, 0b100, 0b111],
        'f' | 'F' => [0b111, 0b100, 0b111, 0b100, 0b100],
        'g' | 'G' => [0b111, 0b100, 0b101, 0b101, 0b111],
        'h' | 'H' => [0b101, 0b101, 0b111, 0b101, 0b101],
        'i' | 'I' => [0b111, 0b010, 0b010, 0b010, 0b111],
        'j' | 'J' => [0b001, 0b001, 0b001, 0b101, 0b111],
        'k' | 'K' => [0b101, 0b101, 0b110, 0b101, 0b101],
        'l' | 'L' => [0b100, 0b100, 0b100, 0b100, 0b111],
        'm' | 'M' => [0b101, 0b111, 0b101, 0b101, 0b101],
        'n' | 'N' => [0b111, 0b101, 0b101, 0b101, 0b101],
        'o' | 'O' => [0b111, 0b101, 0b101, 0b101, 0b111],
        'p' | 'P' => [0b111, 0b101, 0b111, 0b100, 0b100],
        'q' | 'Q' => [0b111, 0b101, 0b101, 0b111, 0b001],
        'r' | 'R' => [0b110, 0b101, 0b110, 0b101, 0b101],
        's' | 'S' => [0b111, 0b100, 0b111, 0b001, 0b111],
        't' | 'T' => [0b111, 0b010, 0b010, 0b010, 0b010],
        'u' | 'U' => [0b101, 0b101, 0b101, 0b101, 0b111],
        'v' | 'V' => [0b101, 0b101, 0b101, 0b010, 0b010],
        'w' | 'W' => [0b101, 0b101, 0b101, 0b111, 0b101],
        'x' | 'X' => [0b101, 0b101, 0b010, 0b101, 0b101],
        'y' | 'Y' => [0b101, 0b101, 0b111, 0b010, 0b010],
        'z' | 'Z' => [0b111, 0b001, 0b010, 0b100, 0b111],
        '/' => [0b001, 0b001, 0b010, 0b100, 0b100],
        '-' => [0b000, 0b000, 0b111, 0b000, 0b000],
        '_' => [0b000, 0b000, 0b000, 0b000, 0b111],
        '.' => [0b000, 0b000, 0b000, 0b000, 0b010],
        ',' => [0b000, 0b000, 0b000, 0b010, 0b100],
        ':' => [0b000, 0b010, 0b000, 0b010, 0b000],
        '=' => [0b000, 0b111, 0b000, 0b111, 0b000],
        '+' => [0b000, 0b010, 0b111, 0b010, 0b000],
        '%' => [0b101, 0b001, 0b010, 0b100, 0b101],
        '(' => [0b001, 0b010, 0b010, 0b010, 0b001],
        ')' => [0b100, 0b010, 0b010, 0b010, 0b100],
        '\'' => [0b010, 0b010, 0b000, 0b000, 0b000],
        ' ' => [0b000, 0b000, 0b000, 0b000, 0b000],
        _   => [0b000, 0b000, 0b010, 0b000, 0b000], // fallback dot
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
