//! Decorative backdrop
//!
//! A checkerboard of dark cells covers the canvas while the engine is idle
//! and pulses while a score preloads. Once preload is done the pulse is let
//! run to its rest point, half of the cells fade out, and the survivors
//! drift as particles behind the channels for the whole session. The hard
//! cut puts the grid back.

use crate::geometry::{Rect, Rgba};
use crate::media::Surface;
use rand::Rng;
use std::f64::consts::PI;

const CELL_COLOR: Rgba = Rgba::rgb(20, 20, 20);

/// Loading pulse phases between two rest points
const PULSE_PERIOD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Cell {
    x: f64,
    y: f64,
    row: u32,
    vx: f64,
    vy: f64,
}

impl Cell {
    /// Cells on even rows stay when the grid dissolves
    fn survives(&self) -> bool {
        self.row % 2 == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackdropMode {
    Grid,
    /// Non-surviving cells fading out
    Dissolving { start: f64 },
    Particles,
}

#[derive(Debug, Clone)]
pub struct Backdrop {
    canvas: (f64, f64),
    density: u32,
    cell_size: f64,
    cells: Vec<Cell>,
    mode: BackdropMode,
    fade: f64,
    pulse_interval: f64,
    /// Pulse position in phases, and the previous reading
    pulse: f64,
    prev_pulse: f64,
}

impl Backdrop {
    pub fn new(canvas: (f64, f64), density: u32, pulse_interval: f64, fade: f64) -> Self {
        let mut backdrop = Self {
            canvas,
            density: density.max(1),
            cell_size: 0.0,
            cells: Vec::new(),
            mode: BackdropMode::Grid,
            fade,
            pulse_interval,
            pulse: 0.0,
            prev_pulse: 0.0,
        };
        backdrop.build_grid();
        backdrop
    }

    pub fn mode(&self) -> BackdropMode {
        self.mode
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Rebuild the grid for a new canvas size
    pub fn resize(&mut self, canvas: (f64, f64)) {
        self.canvas = canvas;
        self.build_grid();
        self.mode = BackdropMode::Grid;
    }

    /// Back to a static grid with the pulse at rest
    pub fn reset(&mut self) {
        self.build_grid();
        self.mode = BackdropMode::Grid;
        self.pulse = 0.0;
        self.prev_pulse = 0.0;
    }

    /// Advance the loading pulse by `dt` seconds
    pub fn pulse(&mut self, dt: f64) {
        self.prev_pulse = self.pulse;
        if self.pulse_interval > 0.0 {
            self.pulse += dt / self.pulse_interval;
        }
    }

    /// Whether the pulse just reached (or sits at) a rest point
    pub fn at_rest(&self) -> bool {
        let cur = self.pulse;
        let prev = self.prev_pulse;
        cur > 0.5
            && (cur % PULSE_PERIOD < 0.03
                || (prev / PULSE_PERIOD).floor() < (cur / PULSE_PERIOD).floor())
    }

    /// Grid alpha for the current pulse position (1 at rest)
    pub fn pulse_alpha(&self) -> f32 {
        (0.55 + 0.45 * (PI * self.pulse).cos()) as f32
    }

    /// Give survivors a random drift and start dissolving the rest
    pub fn begin_dissolve<R: Rng + ?Sized>(&mut self, now: f64, rng: &mut R) {
        for cell in self.cells.iter_mut().filter(|c| c.survives()) {
            let speed = rng.gen_range(8.0..32.0);
            let angle = rng.gen::<f64>() * 2.0 * PI;
            cell.vx = speed * angle.cos();
            cell.vy = speed * angle.sin();
        }
        self.mode = BackdropMode::Dissolving { start: now };
    }

    /// Dissolve progress in `[0, 1]`; switches to particles at 1
    pub fn dissolve_progress(&mut self, now: f64) -> f64 {
        let BackdropMode::Dissolving { start } = self.mode else {
            return if self.mode == BackdropMode::Particles { 1.0 } else { 0.0 };
        };
        let progress = if self.fade > 0.0 {
            ((now - start) / self.fade).clamp(0.0, 1.0)
        } else {
            1.0
        };
        if progress >= 1.0 {
            self.cells.retain(Cell::survives);
            self.mode = BackdropMode::Particles;
        }
        progress
    }

    /// Move particles by `dt` seconds scaled by `speed`, wrapping at the
    /// canvas edges
    pub fn drift(&mut self, dt: f64, speed: f64) {
        if self.mode != BackdropMode::Particles {
            return;
        }
        let (w, h) = self.canvas;
        let size = self.cell_size;
        for cell in &mut self.cells {
            cell.x += cell.vx * dt * speed;
            cell.y += cell.vy * dt * speed;
            if w > 0.0 {
                cell.x = (cell.x + size).rem_euclid(w + size) - size;
            }
            if h > 0.0 {
                cell.y = (cell.y + size).rem_euclid(h + size) - size;
            }
        }
    }

    pub fn draw(&mut self, surface: &mut dyn Surface, now: f64) {
        let size = self.cell_size;
        match self.mode {
            BackdropMode::Grid => {
                let color = CELL_COLOR.with_alpha(self.pulse_alpha());
                for cell in &self.cells {
                    surface.fill_rect(Rect::new(cell.x, cell.y, size, size), color);
                }
            }
            BackdropMode::Dissolving { .. } => {
                let fading = CELL_COLOR.with_alpha((1.0 - self.dissolve_progress(now)) as f32);
                for cell in &self.cells {
                    let color = if cell.survives() { CELL_COLOR } else { fading };
                    surface.fill_rect(Rect::new(cell.x, cell.y, size, size), color);
                }
            }
            BackdropMode::Particles => {
                for cell in &self.cells {
                    surface.fill_rect(Rect::new(cell.x, cell.y, size, size), CELL_COLOR);
                }
            }
        }
    }

    fn build_grid(&mut self) {
        let (w, h) = self.canvas;
        self.cells.clear();
        self.cell_size = w.min(h) / self.density as f64;
        if self.cell_size <= 0.0 {
            return;
        }
        let cols = (w / self.cell_size).ceil() as u32;
        let rows = (h / self.cell_size).ceil() as u32;
        for row in 0..rows {
            for col in 0..cols {
                if (row + col) % 2 == 1 {
                    self.cells.push(Cell {
                        x: col as f64 * self.cell_size,
                        y: row as f64 * self.cell_size,
                        row,
                        vx: 0.0,
                        vy: 0.0,
                    });
                }
            }
        }
    }
}
