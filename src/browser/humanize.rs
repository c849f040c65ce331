//! Humanlike input pacing on top of a [`PageDriver`].
//!
//! Owns the tracked cursor position for one browser session and replays
//! synthesized motion paths, variable-speed typing, and named
//! inter-action pauses. All randomness models human micro-variance; none
//! of it is load-bearing for correctness.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Mutex;

use super::driver::{ElementHandle, PageDriver};
use super::errors::DriveError;
use crate::motion::{MotionConfig, MotionSynthesizer, Point};
use crate::retry::{retry, RetryPolicy};

const PUNCTUATION: &str = ".,@!?-_";

/// Named pause bands between actions, `(min, max)` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayBand {
    Micro,
    Short,
    Action,
    Thinking,
    Page,
}

impl DelayBand {
    fn range(self) -> (f64, f64) {
        match self {
            DelayBand::Micro => (0.05, 0.15),
            DelayBand::Short => (0.3, 0.8),
            DelayBand::Action => (0.8, 2.0),
            DelayBand::Thinking => (1.5, 3.5),
            DelayBand::Page => (2.5, 4.5),
        }
    }
}

/// Per-character typing cadence, `(min, max)` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSpeed {
    Fast,
    Normal,
    Slow,
}

impl TypingSpeed {
    fn range(self) -> (f64, f64) {
        match self {
            TypingSpeed::Fast => (0.03, 0.08),
            TypingSpeed::Normal => (0.05, 0.12),
            TypingSpeed::Slow => (0.08, 0.18),
        }
    }
}

/// Input driver for one browser session. Tracks the cursor position and
/// paces every interaction. Exclusively owned by one workflow instance.
pub struct HumanInput {
    driver: Arc<dyn PageDriver>,
    motion: MotionSynthesizer,
    retry_policy: RetryPolicy,
    cursor: Mutex<Point>,
    /// Global speed divisor; larger is faster.
    speed: f64,
}

impl HumanInput {
    pub fn new(
        driver: Arc<dyn PageDriver>,
        mut motion_config: MotionConfig,
        speed: f64,
        retry_policy: RetryPolicy,
    ) -> Self {
        let speed = if speed > 0.0 { speed } else { 1.0 };
        motion_config.speed_factor /= speed;
        let cursor = {
            let mut rng = rand::rng();
            Point::new(rng.random_range(100.0..=400.0), rng.random_range(100.0..=300.0))
        };
        Self {
            driver,
            motion: MotionSynthesizer::new(motion_config),
            retry_policy,
            cursor: Mutex::new(cursor),
            speed,
        }
    }

    pub fn driver(&self) -> &Arc<dyn PageDriver> {
        &self.driver
    }

    pub async fn cursor(&self) -> Point {
        *self.cursor.lock().await
    }

    /// Sleep for a randomized duration in the given band, occasionally
    /// stretched to model distraction.
    pub async fn pause(&self, band: DelayBand) {
        let seconds = {
            let (min, mut max) = band.range();
            let mut rng = rand::rng();
            if band != DelayBand::Micro && rng.random_bool(0.1) {
                max += rng.random_range(0.5..=1.5);
            }
            rng.random_range(min..=max)
        };
        tokio::time::sleep(Duration::from_secs_f64(seconds / self.speed)).await;
    }

    /// Locate an element by CSS selector, retrying transient misses.
    pub async fn select(&self, selector: &str) -> Result<ElementHandle, DriveError> {
        retry(&self.retry_policy, &format!("select '{selector}'"), || {
            self.driver.select(selector)
        })
        .await
    }

    /// Locate an element by visible text, retrying transient misses.
    pub async fn find_text(&self, query: &str) -> Result<ElementHandle, DriveError> {
        retry(&self.retry_policy, &format!("find '{query}'"), || {
            self.driver.find_text(query)
        })
        .await
    }

    /// Evaluate a script against the page, retried.
    pub async fn apply(&self, script: &str) -> Result<serde_json::Value, DriveError> {
        retry(&self.retry_policy, "apply JS", || self.driver.evaluate(script)).await
    }

    /// Move the cursor to the element along a synthesized path, then
    /// click it.
    pub async fn click(&self, element: &ElementHandle) -> Result<(), DriveError> {
        self.move_to(element).await?;
        retry(&self.retry_policy, "click", || self.driver.click(element)).await
    }

    /// Replay a humanlike cursor path from the current position to a
    /// jittered point inside the element.
    pub async fn move_to(&self, element: &ElementHandle) -> Result<(), DriveError> {
        let geometry = retry(&self.retry_policy, "element geometry", || {
            self.driver.geometry(element)
        })
        .await?;

        let target = {
            let mut rng = rand::rng();
            Point::new(
                geometry.x
                    + geometry.width / 2.0
                    + rng.random_range(-geometry.width * 0.15..=geometry.width * 0.15),
                geometry.y
                    + geometry.height / 2.0
                    + rng.random_range(-geometry.height * 0.15..=geometry.height * 0.15),
            )
        };

        let start = *self.cursor.lock().await;
        let path = self.motion.generate_path(start, target);
        let delays = self.motion.calculate_delays(&path);

        for (i, point) in path.iter().enumerate() {
            self.driver.dispatch_move_event(point.x, point.y).await?;
            if let Some(delay_ms) = delays.get(i) {
                tokio::time::sleep(Duration::from_secs_f64(delay_ms / 1000.0)).await;
            }
        }

        *self.cursor.lock().await = target;
        Ok(())
    }

    /// Type text one character at a time with humanlike micro-variance.
    /// Punctuation drags a little, some keystrokes hesitate, and typing
    /// speeds up once warmed up.
    pub async fn type_text(
        &self,
        element: &ElementHandle,
        text: &str,
        speed: TypingSpeed,
    ) -> Result<(), DriveError> {
        let (base_min, base_max) = speed.range();
        for (i, ch) in text.chars().enumerate() {
            self.driver.type_text(element, &ch.to_string()).await?;
            let seconds = {
                let mut rng = rand::rng();
                let mut delay = rng.random_range(base_min..=base_max);
                if PUNCTUATION.contains(ch) {
                    delay += rng.random_range(0.05..=0.15);
                }
                if rng.random_bool(0.03) {
                    delay += rng.random_range(0.2..=0.5);
                }
                if i > 3 && rng.random_bool(0.3) {
                    delay *= 0.85;
                }
                delay
            };
            tokio::time::sleep(Duration::from_secs_f64(seconds / self.speed)).await;
        }
        Ok(())
    }
}
