use crate::errors::ResolutionResult;
use crate::modes::MatchMode;
use crate::resolver::ModeResolver;
use rand::seq::IndexedRandom;
use rand::Rng;
use schema::RotationConfig;
use tracing::info;

/// A rotating group of pre-resolved gimmicks. Automated matches draw from the
/// current group until the next [`Rotation::rotate`].
#[derive(Debug, Clone)]
pub struct Rotation {
    pub enabled: bool,
    pub gimmick_chance: f64,
    gimmicks_per_rotation: usize,
    current: Vec<MatchMode>,
}

impl Rotation {
    pub fn new(config: &RotationConfig) -> Self {
        Self {
            enabled: config.enabled,
            gimmick_chance: config.gimmick_chance,
            gimmicks_per_rotation: config.gimmicks_per_rotation,
            current: Vec::new(),
        }
    }

    pub fn gimmicks(&self) -> &[MatchMode] {
        &self.current
    }

    /// Replaces the group. Gimmicks of the previous group, and gimmicks
    /// already picked for this one, are not drawn again.
    pub fn rotate<R: Rng + ?Sized>(
        &mut self,
        resolver: &ModeResolver,
        rng: &mut R,
    ) -> ResolutionResult<()> {
        let mut forbidden: Vec<String> = self
            .current
            .iter()
            .map(|gimmick| gimmick.primary_id().to_string())
            .collect();

        let mut next = Vec::with_capacity(self.gimmicks_per_rotation);
        for _ in 0..self.gimmicks_per_rotation {
            let forbidden_ids: Vec<&str> = forbidden.iter().map(String::as_str).collect();
            let gimmick = resolver.make_gimmick(None, &forbidden_ids, rng)?;
            forbidden.push(gimmick.primary_id().to_string());
            next.push(gimmick);
        }

        let listing: Vec<String> = next.iter().map(|gimmick| format!("\n\t{}", gimmick)).collect();
        info!("Gimmicks selected for rotation:{}", listing.concat());
        self.current = next;
        Ok(())
    }

    /// A random gimmick of the current group.
    pub fn get<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&MatchMode> {
        self.current.choose(rng)
    }
}
