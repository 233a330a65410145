use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::geometry::{GeometryError, PointPx};
use crate::physics::{step_body, Dynamic, Hero, PhysicsConfig, StepOutcome, Vector2D};
use crate::props::{Burst, Light, LightConfig, LightConfigError, Trigger};
use crate::render::{Compositor, CompositorError, DynamicProp, SpriteStamp, TexturePack, Viewport};
use crate::world::{CellCoord, LevelData, TextureId, Tile, TileGrid, TileGridError, CELL_SIZE};

use super::InputFrame;

const DEFAULT_LIGHT_SEED: u64 = 0x5EED_0F_11_6471;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Horizontal dead-zone margin as a fraction of the viewport width.
    pub margin_x_ratio: f64,
    pub margin_top_ratio: f64,
    pub margin_bottom_ratio: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            margin_x_ratio: 0.25,
            margin_top_ratio: 0.2,
            margin_bottom_ratio: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// The session is lost once the hero's Y drops below this.
    pub floor_y: i32,
    /// Seed for light radii. `None` uses a fixed default.
    pub seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            floor_y: -100,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub physics: PhysicsConfig,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub session: SessionConfig,
}

/// World pixel shown at the bottom-left corner of the viewport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Camera {
    pub offset: PointPx,
}

impl Camera {
    /// Shifts the camera the least amount that keeps a sprite at `origin` with `size` inside the
    /// margin window.
    pub fn follow(
        &mut self,
        origin: PointPx,
        size: (i32, i32),
        viewport: Viewport,
        config: &CameraConfig,
    ) {
        let width = viewport.width as i32;
        let height = viewport.height as i32;
        let margin_x = (f64::from(width) * config.margin_x_ratio) as i32;
        let margin_top = (f64::from(height) * config.margin_top_ratio) as i32;
        let margin_bottom = (f64::from(height) * config.margin_bottom_ratio) as i32;

        if origin.x - margin_x < self.offset.x {
            self.offset.x = origin.x - margin_x;
        } else if origin.x + margin_x > self.offset.x + width - size.0 {
            self.offset.x = origin.x + margin_x - width + size.0;
        }

        if origin.y - margin_bottom < self.offset.y {
            self.offset.y = origin.y - margin_bottom;
        } else if origin.y + margin_top > self.offset.y + height - size.1 {
            self.offset.y = origin.y + margin_top - height + size.1;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Running,
    ReachedExit,
    FellOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub step: StepOutcome,
    pub lights_toggled: usize,
    pub bursts_expired: usize,
    pub outcome: SessionOutcome,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),
    #[error(transparent)]
    TileGrid(#[from] TileGridError),
    #[error(transparent)]
    Compositor(#[from] CompositorError),
    #[error(transparent)]
    LightConfig(#[from] LightConfigError),
}

/// One play session: the level, the hero, its lights and effects, and the compositor that
/// draws them. Runs headless; the window loop only feeds it time and input.
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    textures: Arc<TexturePack>,
    grid: TileGrid,
    hero: Hero,
    lights: Vec<Light>,
    bursts: Vec<Burst>,
    exit: Option<CellCoord>,
    compositor: Compositor,
    camera: Camera,
    viewport: Viewport,
    clock: Duration,
    frames: u64,
    outcome: SessionOutcome,
}

impl Simulation {
    pub fn new(
        level: &LevelData,
        textures: Arc<TexturePack>,
        viewport: Viewport,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        config.light.validate()?;
        let grid = level.build_grid(Arc::clone(&textures))?;
        let hero_sprite = textures.get(TextureId::Hero);
        let hero = Hero::new(
            level.start_or_default(),
            hero_sprite.width(),
            hero_sprite.height(),
        )?;

        let mut rng = Pcg32::seed_from_u64(config.session.seed.unwrap_or(DEFAULT_LIGHT_SEED));
        let lights = grid
            .find_all(Tile::LightOff)
            .into_iter()
            .map(|corner| Light::for_cell(corner, &config.light, &mut rng))
            .collect::<Result<Vec<_>, _>>()?;

        let compositor = Compositor::for_grid(&grid)?;
        let mut simulation = Self {
            config,
            textures,
            grid,
            hero,
            lights,
            bursts: Vec::new(),
            exit: level.exit,
            compositor,
            camera: Camera::default(),
            viewport,
            clock: Duration::ZERO,
            frames: 0,
            outcome: SessionOutcome::Running,
        };
        simulation.follow_hero();
        info!(
            cols = simulation.grid.cols(),
            rows = simulation.grid.rows(),
            lights = simulation.lights.len(),
            start_x = simulation.hero.position().x,
            start_y = simulation.hero.position().y,
            has_exit = simulation.exit.is_some(),
            "simulation_ready"
        );
        Ok(simulation)
    }

    /// Runs one fixed update of `dt`, already clamped by the caller.
    ///
    /// Order: jump, physics step, camera, end conditions, triggers, effect cleanup.
    pub fn tick(&mut self, dt: Duration, input: InputFrame) -> Result<TickReport, SimulationError> {
        self.frames += 1;
        self.clock += dt;
        let physics = self.config.physics;

        if input.jump_requested && self.hero.on_ground() {
            let velocity = self.hero.velocity();
            self.hero
                .set_velocity(Vector2D::new(velocity.x, physics.jump_speed));
        }

        let force = input.direction.scaled(physics.move_force);
        let step = step_body(&mut self.hero, force, &self.grid, &physics, dt.as_secs_f64());
        self.hero.set_sprite(if step.landed {
            TextureId::HeroGround
        } else {
            TextureId::Hero
        });

        self.follow_hero();
        self.update_outcome();

        let lights_toggled = self.run_triggers()?;

        let before = self.bursts.len();
        let now = self.clock;
        self.bursts.retain(|burst| !burst.is_expired(now));
        let bursts_expired = before - self.bursts.len();

        Ok(TickReport {
            step,
            lights_toggled,
            bursts_expired,
            outcome: self.outcome,
        })
    }

    /// Composites the current state into an RGBA8 surface of the viewport's size.
    pub fn draw(&mut self, frame: &mut [u8]) -> Result<(), CompositorError> {
        let dynamic = std::iter::once(&self.hero as &dyn DynamicProp)
            .chain(self.bursts.iter().map(|burst| burst as &dyn DynamicProp));
        let mut stamps: Vec<SpriteStamp<'_>> = Vec::new();
        for prop in dynamic {
            prop.push_stamps(self.clock, &self.textures, &mut stamps);
        }
        self.compositor.draw(
            frame,
            self.viewport,
            self.camera.offset,
            &self.grid,
            &self.lights,
            &stamps,
        )
    }

    pub fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.follow_hero();
    }

    /// Forces a full static recompute on the next draw.
    pub fn invalidate(&mut self) {
        self.compositor.invalidate();
    }

    pub fn hero(&self) -> &Hero {
        &self.hero
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn bursts(&self) -> &[Burst] {
        &self.bursts
    }

    pub fn camera(&self) -> Camera {
        self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn clock(&self) -> Duration {
        self.clock
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn outcome(&self) -> SessionOutcome {
        self.outcome
    }

    pub fn is_running(&self) -> bool {
        self.outcome == SessionOutcome::Running
    }

    fn follow_hero(&mut self) {
        self.camera.follow(
            self.hero.sprite_origin(),
            self.hero.sprite_size(),
            self.viewport,
            &self.config.camera,
        );
    }

    fn update_outcome(&mut self) {
        if self.outcome != SessionOutcome::Running {
            return;
        }
        if self.hero.position().y < self.config.session.floor_y {
            self.outcome = SessionOutcome::FellOut;
        } else if let Some(exit) = self.exit {
            let center = exit.origin_px().offset(CELL_SIZE / 2, CELL_SIZE / 2);
            if self.hero.bounds().contains_point(center) {
                self.outcome = SessionOutcome::ReachedExit;
            }
        }
        if self.outcome != SessionOutcome::Running {
            info!(outcome = ?self.outcome, frames = self.frames, "session_ended");
        }
    }

    fn run_triggers(&mut self) -> Result<usize, SimulationError> {
        let bbox = self.hero.bounds();
        let now = self.clock;
        let mut dirty = Vec::new();
        for light in &mut self.lights {
            if !light.is_triggered(bbox, now) {
                continue;
            }
            dirty.push(light.trigger(&mut self.grid, now)?);
            self.bursts.push(Burst::new(light.anchor(), now));
        }
        for region in &dirty {
            self.compositor
                .invalidate_region(*region, &self.grid, &self.lights)?;
        }
        if !dirty.is_empty() {
            debug!(
                toggled = dirty.len(),
                bursts = self.bursts.len(),
                "triggers_fired"
            );
        }
        Ok(dirty.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;

    const VIEWPORT: Viewport = Viewport {
        width: 300,
        height: 240,
    };
    const STEP: Duration = Duration::from_millis(50);

    fn textures() -> Arc<TexturePack> {
        Arc::new(TexturePack::procedural().expect("textures"))
    }

    fn calm_config() -> SimulationConfig {
        SimulationConfig {
            physics: PhysicsConfig {
                vertical_drag_ratio: 0.0,
                ..PhysicsConfig::default()
            },
            session: SessionConfig {
                seed: Some(3),
                ..SessionConfig::default()
            },
            ..SimulationConfig::default()
        }
    }

    fn simulation(level: &str) -> Simulation {
        let level = LevelData::parse(level).expect("level");
        Simulation::new(&level, textures(), VIEWPORT, calm_config()).expect("simulation")
    }

    fn run(sim: &mut Simulation, ticks: usize, input: InputFrame) -> TickReport {
        let mut last = None;
        for _ in 0..ticks {
            last = Some(sim.tick(STEP, input).expect("tick"));
        }
        last.expect("at least one tick")
    }

    const FLOOR_LEVEL: &str = "5 8\n-----\n-----\n-----\n-----\n-----\n-----\n-----\n#####\n";

    #[test]
    fn hero_settles_on_floor_and_lands() {
        let mut sim = simulation(FLOOR_LEVEL);
        assert_eq!(sim.hero().position(), PointPx::new(0, 8 * CELL_SIZE));

        let report = run(&mut sim, 60, InputFrame::default());

        assert_eq!(sim.hero().bounds().y, CELL_SIZE);
        assert!(sim.hero().on_ground());
        assert_eq!(sim.hero().velocity().y, 0.0);
        assert_eq!(sim.hero().sprite(), TextureId::HeroGround);
        assert!(report.step.landed);
        assert_eq!(report.outcome, SessionOutcome::Running);
    }

    #[test]
    fn jump_only_works_from_the_ground() {
        let mut sim = simulation(FLOOR_LEVEL);
        let jump = InputFrame {
            jump_requested: true,
            ..InputFrame::default()
        };
        sim.tick(STEP, jump).expect("airborne jump");
        assert!(sim.hero().velocity().y < 0.0);

        run(&mut sim, 60, InputFrame::default());
        sim.tick(STEP, jump).expect("ground jump");
        assert!(sim.hero().velocity().y > 0.0);
        assert!(!sim.hero().on_ground());
    }

    #[test]
    fn falling_off_the_world_ends_the_session() {
        let mut sim = simulation("3 2\n---\n---\n");
        let mut outcome = SessionOutcome::Running;
        for _ in 0..200 {
            outcome = sim.tick(STEP, InputFrame::default()).expect("tick").outcome;
            if outcome != SessionOutcome::Running {
                break;
            }
        }
        assert_eq!(outcome, SessionOutcome::FellOut);
        assert!(sim.hero().position().y < -100);
    }

    #[test]
    fn touching_exit_reaches_it() {
        let mut sim = simulation("3 3\n---\nIO-\n###\n");
        let right = InputFrame {
            direction: Vector2D::new(1.0, 0.0),
            ..InputFrame::default()
        };
        let mut outcome = SessionOutcome::Running;
        for _ in 0..100 {
            outcome = sim.tick(STEP, right).expect("tick").outcome;
            if outcome != SessionOutcome::Running {
                break;
            }
        }
        assert_eq!(outcome, SessionOutcome::ReachedExit);
    }

    #[test]
    fn walking_into_a_light_toggles_it_and_spawns_a_burst() {
        let mut sim = simulation("6 3\n------\nI-i---\n######\n");
        assert_eq!(sim.lights().len(), 1);
        assert!(!sim.lights()[0].is_on());
        let right = InputFrame {
            direction: Vector2D::new(1.0, 0.0),
            ..InputFrame::default()
        };

        let mut toggled = 0;
        for _ in 0..12 {
            toggled += sim.tick(STEP, right).expect("tick").lights_toggled;
            if toggled > 0 {
                break;
            }
        }
        assert_eq!(toggled, 1);
        assert!(sim.lights()[0].is_on());
        assert_eq!(sim.grid().get(2, 1), Tile::LightOn);
        assert_eq!(sim.bursts().len(), 1);

        let report = run(&mut sim, 10, InputFrame::default());
        assert!(sim.bursts().is_empty());
        assert_eq!(report.bursts_expired, 0);
    }

    #[test]
    fn partial_invalidation_matches_full_redraw_after_toggle() {
        let mut sim = simulation("6 3\n------\nI-i---\n######\n");
        let mut frame = vec![0u8; VIEWPORT.byte_len()];
        sim.draw(&mut frame).expect("first draw");

        let right = InputFrame {
            direction: Vector2D::new(1.0, 0.0),
            ..InputFrame::default()
        };
        while sim.lights().iter().all(|light| !light.is_on()) {
            sim.tick(STEP, right).expect("tick");
            assert!(sim.frames() < 50, "light never toggled");
        }
        sim.draw(&mut frame).expect("partial draw");
        let partial = sim.compositor.merged().clone();

        sim.invalidate();
        sim.draw(&mut frame).expect("full draw");
        assert_eq!(&partial, sim.compositor.merged());
    }

    #[test]
    fn light_radii_follow_the_seed() {
        let level = "4 2\ni-i-\n####\n";
        let a = simulation(level);
        let b = simulation(level);
        let radii = |sim: &Simulation| sim.lights().iter().map(Light::radius).collect::<Vec<_>>();
        assert_eq!(radii(&a), radii(&b));
        assert_eq!(a.lights()[0].position(), PointPx::new(15, 45));
    }

    #[test]
    fn overflowing_light_config_is_an_error() {
        let level = LevelData::parse("4 2\ni-i-\n####\n").expect("level");
        let config = SimulationConfig {
            light: LightConfig {
                min_radius: i32::MAX - 10,
                radius_span: 100,
                ..LightConfig::default()
            },
            ..calm_config()
        };
        let err = Simulation::new(&level, textures(), VIEWPORT, config).expect_err("should fail");
        assert!(matches!(
            err,
            SimulationError::LightConfig(LightConfigError::RadiusTooLarge { .. })
        ));
    }

    #[test]
    fn camera_moves_only_when_margin_is_crossed() {
        let viewport = Viewport {
            width: 400,
            height: 200,
        };
        let config = CameraConfig::default();
        let mut camera = Camera::default();

        camera.follow(PointPx::new(150, 60), (30, 30), viewport, &config);
        assert_eq!(camera.offset, PointPx::new(0, 0));

        camera.follow(PointPx::new(300, 60), (30, 30), viewport, &config);
        assert_eq!(camera.offset.x, 300 + 100 - 400 + 30);

        camera.follow(PointPx::new(20, 10), (30, 30), viewport, &config);
        assert_eq!(camera.offset, PointPx::new(20 - 100, 10 - 40));
    }

    #[test]
    fn draw_shows_hero_and_rejects_wrong_surface() {
        let mut sim = simulation(FLOOR_LEVEL);
        run(&mut sim, 60, InputFrame::default());
        let mut frame = vec![0u8; VIEWPORT.byte_len()];
        sim.draw(&mut frame).expect("draw");

        let hero_box: Rect = sim.hero().bounds();
        let center = PointPx::new(hero_box.x + 9, hero_box.y + 4);
        let (sx, sy) =
            crate::render::world_to_screen_px(center, sim.camera().offset, sim.viewport());
        let offset = (sy as usize * VIEWPORT.width as usize + sx as usize) * 4;
        let hero_color = sim.textures.get(TextureId::HeroGround).pixel(14, 9);
        assert_eq!(frame[offset + 1], crate::render::channel_to_u8(hero_color[1]));

        let mut wrong = vec![0u8; 8];
        assert!(sim.draw(&mut wrong).is_err());
    }
}
