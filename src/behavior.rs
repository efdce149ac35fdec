//! Human-behaviour simulation: eased scrolling and Bézier-curve pointer
//! movement dispatched into a live page, plus the framework/asset readiness
//! waiters the render state machine calls during `Stabilising`/`Mutating`.

use chromiumoxide::page::Page;
use rand::Rng;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

pub struct InteractionSimulator;

impl InteractionSimulator {
    /// Scroll to the bottom in eased steps, pause, then scroll back to top.
    /// Best-effort: any page-side failure is logged and swallowed.
    pub async fn eased_scroll_to_bottom(page: &Page) {
        if let Err(err) = Self::eased_scroll_to_bottom_inner(page).await {
            warn!(error = %err, "eased scroll step failed, continuing");
        }
    }

    async fn eased_scroll_to_bottom_inner(page: &Page) -> Result<(), chromiumoxide::error::CdpError> {
        let mut rng = rand::thread_rng();

        for _ in 0..50 {
            let step: f64 = rng.gen_range(75.0..125.0);
            page.evaluate(format!(
                "window.scrollBy({{top: {step}, behavior: 'auto'}})"
            ))
            .await?;

            let at_bottom: bool = page
                .evaluate(
                    "(window.innerHeight + window.scrollY) >= (document.body.scrollHeight - 100)",
                )
                .await?
                .into_value()
                .unwrap_or(false);

            let pause_ms = rng.gen_range(150..=250);
            tokio::time::sleep(Duration::from_millis(pause_ms)).await;

            if rng.gen_bool(0.15) {
                let idle_ms = rng.gen_range(200..=500);
                tokio::time::sleep(Duration::from_millis(idle_ms)).await;
            }

            if at_bottom {
                break;
            }
        }

        let settle_ms = rng.gen_range(500..=1500);
        tokio::time::sleep(Duration::from_millis(settle_ms)).await;

        page.evaluate("window.scrollTo({top: 0, behavior: 'smooth'})")
            .await?;
        tokio::time::sleep(Duration::from_millis(800)).await;

        let lazy_ms = rng.gen_range(1500..=2500);
        tokio::time::sleep(Duration::from_millis(lazy_ms)).await;

        Ok(())
    }

    /// Dispatch a handful of eased mouse trajectories and a blur/focus pair.
    /// Best-effort.
    pub async fn simulate_mouse(page: &Page, viewport: (u32, u32)) {
        if let Err(err) = Self::simulate_mouse_inner(page, viewport).await {
            warn!(error = %err, "mouse simulation step failed, continuing");
        }
    }

    async fn simulate_mouse_inner(
        page: &Page,
        viewport: (u32, u32),
    ) -> Result<(), chromiumoxide::error::CdpError> {
        let mut rng = rand::thread_rng();
        let trajectories = rng.gen_range(3..=7);

        let mut current = Point {
            x: rng.gen_range(0.0..viewport.0 as f64),
            y: rng.gen_range(0.0..viewport.1 as f64),
        };

        for _ in 0..trajectories {
            let target = Point {
                x: rng.gen_range(0.0..viewport.0 as f64),
                y: rng.gen_range(0.0..viewport.1 as f64),
            };

            let path = generate_mouse_path(current, target);
            for (point, delay) in path.points.iter().zip(path.delays.iter()) {
                page.evaluate(format!(
                    "document.dispatchEvent(new MouseEvent('mousemove', {{clientX: {}, clientY: {}, bubbles: true}}))",
                    point.x, point.y
                ))
                .await?;
                tokio::time::sleep(Duration::from_millis(*delay)).await;
            }

            current = target;

            if rng.gen_bool(0.2) {
                page.evaluate(
                    "document.activeElement && document.activeElement.blur && document.activeElement.blur()",
                )
                .await?;
            }

            let between_ms = rng.gen_range(100..=300);
            tokio::time::sleep(Duration::from_millis(between_ms)).await;
        }

        page.evaluate("window.dispatchEvent(new Event('blur')); window.dispatchEvent(new Event('focus'))")
            .await?;

        Ok(())
    }

    /// Resolve once jQuery/React/Vue/Angular readiness markers settle, or a
    /// 2s ceiling is reached, whichever comes first.
    pub async fn wait_for_frameworks(page: &Page) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            let ready: bool = page
                .evaluate(
                    r#"(function() {
                        if (window.jQuery && window.jQuery.isReady) return true;
                        if (document.querySelector('[data-reactroot], #root, #app')) return true;
                        if (window.Vue || window.angular) return true;
                        return false;
                    })()"#,
                )
                .await
                .ok()
                .and_then(|v| v.into_value().ok())
                .unwrap_or(false);

            if ready || tokio::time::Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    /// Wait for stylesheets, fonts, and images to settle. Best-effort, each
    /// sub-wait individually bounded.
    pub async fn wait_for_stylesheets_and_images(page: &Page) {
        let script = r#"(async function() {
            const sheets = Array.from(document.styleSheets);
            for (const sheet of sheets) {
                try { void sheet.cssRules; } catch (e) { /* cross-origin, counts as loaded */ }
            }
            if (document.fonts && document.fonts.ready) {
                await Promise.race([
                    document.fonts.ready,
                    new Promise((resolve) => setTimeout(resolve, 8000)),
                ]);
            }
            const images = Array.from(document.images);
            await Promise.all(images.map((img) => {
                if (img.complete) return Promise.resolve();
                return Promise.race([
                    new Promise((resolve) => {
                        img.addEventListener('load', resolve, { once: true });
                        img.addEventListener('error', resolve, { once: true });
                    }),
                    new Promise((resolve) => setTimeout(resolve, 6000)),
                ]);
            }));
        })()"#;

        if let Err(err) = page.evaluate(script).await {
            warn!(error = %err, "stylesheet/image wait failed, continuing");
        }
    }
}

struct MousePath {
    points: Vec<Point>,
    delays: Vec<u64>,
}

fn generate_mouse_path(start: Point, end: Point) -> MousePath {
    let mut rng = rand::thread_rng();
    let distance = start.distance_to(&end);
    let num_steps = ((distance / 10.0).round().clamp(30.0, 100.0)) as usize;

    let control1 = random_control_point(start, end, 0.33, &mut rng);
    let control2 = random_control_point(start, end, 0.67, &mut rng);

    let mut points = Vec::with_capacity(num_steps);
    let mut delays = Vec::with_capacity(num_steps);

    for i in 0..=num_steps {
        let t = i as f64 / num_steps as f64;
        points.push(cubic_bezier(t, start, control1, control2, end));

        let speed_factor = ease_in_out_cubic(t);
        let base_delay = 10.0 * (1.0 + (1.0 - speed_factor));
        let jitter: f64 = rng.gen_range(0.7..=1.3);
        let delay = ((base_delay * jitter).round() as u64).max(5);
        delays.push(delay);
    }

    MousePath { points, delays }
}

fn random_control_point(start: Point, end: Point, position: f64, rng: &mut impl Rng) -> Point {
    let base_x = start.x + (end.x - start.x) * position;
    let base_y = start.y + (end.y - start.y) * position;

    let distance = start.distance_to(&end);
    let max_offset = (distance * 0.2).min(100.0);
    let offset: f64 = rng.gen_range(-max_offset..=max_offset);

    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length = (dx * dx + dy * dy).sqrt();

    if length > 0.0 {
        let perp_x = -dy / length;
        let perp_y = dx / length;
        Point { x: base_x + perp_x * offset, y: base_y + perp_y * offset }
    } else {
        Point { x: base_x, y: base_y }
    }
}

fn cubic_bezier(t: f64, p0: Point, p1: Point, p2: Point, p3: Point) -> Point {
    let t2 = t * t;
    let t3 = t2 * t;
    let mt = 1.0 - t;
    let mt2 = mt * mt;
    let mt3 = mt2 * mt;

    Point {
        x: mt3 * p0.x + 3.0 * mt2 * t * p1.x + 3.0 * mt * t2 * p2.x + t3 * p3.x,
        y: mt3 * p0.y + 3.0 * mt2 * t * p1.y + 3.0 * mt * t2 * p2.y + t3 * p3.y,
    }
}

fn ease_in_out_cubic(t: f64) -> f64 {
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let f = 2.0 * t - 2.0;
        1.0 + f * f * f / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mouse_path_step_count_is_clamped() {
        let path = generate_mouse_path(Point { x: 0.0, y: 0.0 }, Point { x: 2000.0, y: 2000.0 });
        assert!(path.points.len() <= 101);
        assert!(path.points.len() >= 31);
    }

    #[test]
    fn mouse_path_delays_never_below_minimum() {
        let path = generate_mouse_path(Point { x: 0.0, y: 0.0 }, Point { x: 50.0, y: 50.0 });
        assert!(path.delays.iter().all(|&d| d >= 5));
    }

    #[test]
    fn bezier_endpoint_matches_input() {
        let p0 = Point { x: 0.0, y: 0.0 };
        let p3 = Point { x: 100.0, y: 100.0 };
        let point = cubic_bezier(1.0, p0, p0, p3, p3);
        assert!((point.x - 100.0).abs() < 1e-6);
    }
}
