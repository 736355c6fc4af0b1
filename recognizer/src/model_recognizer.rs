use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, info};
use voxid_model::{Model, ModelError};
use voxid_vector::FeatureVector;

use crate::{
    Identification, Recognizer, RecognizerConfig, RecognizerError, ScoreNormalization, ScoreStats,
    SpeakerKey, SpeechData, TrainingSet, Utterance, Verification,
};

/// Supplies the model type of a [`ModelRecognizer`].
pub trait ModelKind: Send + Sync + 'static {
    type Model: Model;

    /// Short name used in run identifiers.
    const NAME: &'static str;

    /// Creates an untrained model for one population slot.
    fn create_model(config: &RecognizerConfig) -> Self::Model;
}

/// Whether the derived state (weights, normalization statistics) matches
/// the trained population.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparationState {
    Untrained,
    Dirty,
    Prepared,
}

#[derive(Debug, Clone)]
enum Slot {
    Background,
    Speaker(SpeakerKey),
    Impostor(SpeakerKey),
}

impl Slot {
    fn key(&self) -> SpeakerKey {
        match self {
            Slot::Background => SpeakerKey::background(),
            Slot::Speaker(k) | Slot::Impostor(k) => k.clone(),
        }
    }
}

fn attributed(speaker: SpeakerKey, source: ModelError) -> RecognizerError {
    RecognizerError::Speaker { speaker, source }
}

fn invalid(msg: impl Into<String>) -> RecognizerError {
    RecognizerError::InvalidConfiguration(msg.into())
}

/// Recognizer over a population of models of one kind.
///
/// Holds an optional background model, one model per enrolled speaker and
/// one per impostor. Weighting and normalization statistics are derived
/// lazily: `train` and relevant `reconfigure` calls mark the state dirty,
/// and the next scoring call runs [`ModelRecognizer::prepare_models`].
pub struct ModelRecognizer<K: ModelKind> {
    config: RecognizerConfig,
    state: PreparationState,
    speaker_data: Option<Arc<SpeechData>>,
    background_data: Option<Arc<SpeechData>>,
    background: Option<K::Model>,
    speakers: BTreeMap<SpeakerKey, K::Model>,
    impostors: BTreeMap<SpeakerKey, K::Model>,
    cohort: Vec<(SpeakerKey, Utterance)>,
    speaker_z: BTreeMap<SpeakerKey, ScoreStats>,
    impostor_z: BTreeMap<SpeakerKey, ScoreStats>,
    _kind: PhantomData<K>,
}

impl<K: ModelKind> ModelRecognizer<K> {
    pub fn new(config: RecognizerConfig) -> Self {
        Self {
            config,
            state: PreparationState::Untrained,
            speaker_data: None,
            background_data: None,
            background: None,
            speakers: BTreeMap::new(),
            impostors: BTreeMap::new(),
            cohort: Vec::new(),
            speaker_z: BTreeMap::new(),
            impostor_z: BTreeMap::new(),
            _kind: PhantomData,
        }
    }

    pub fn state(&self) -> PreparationState {
        self.state
    }

    pub fn background_model(&self) -> Option<&K::Model> {
        self.background.as_ref()
    }

    pub fn speaker_models(&self) -> &BTreeMap<SpeakerKey, K::Model> {
        &self.speakers
    }

    pub fn impostor_models(&self) -> &BTreeMap<SpeakerKey, K::Model> {
        &self.impostors
    }

    pub fn set_weighting_enabled(&mut self, enabled: bool) {
        self.reconfigure_with(|c| c.weighting_enabled = enabled);
    }

    pub fn is_weighting_enabled(&self) -> bool {
        self.config.weighting_enabled
    }

    pub fn set_score_normalization(&mut self, normalization: ScoreNormalization) {
        self.reconfigure_with(|c| c.score_normalization = normalization);
    }

    pub fn set_decision_threshold(&mut self, threshold: Option<f64>) {
        self.reconfigure_with(|c| c.decision_threshold = threshold);
    }

    fn reconfigure_with(&mut self, f: impl FnOnce(&mut RecognizerConfig)) {
        let mut config = self.config.clone();
        f(&mut config);
        Recognizer::reconfigure(self, config);
    }

    /// Runs the weighting pass and computes normalization statistics.
    /// Does nothing when already prepared.
    pub fn prepare_models(&mut self) -> Result<(), RecognizerError> {
        match self.state {
            PreparationState::Untrained => return Err(RecognizerError::NotTrained),
            PreparationState::Prepared => return Ok(()),
            PreparationState::Dirty => {}
        }

        let normalization = self.config.score_normalization;
        if normalization.uses_test() && self.impostors.is_empty() {
            return Err(invalid(format!(
                "{normalization} normalization needs impostor models"
            )));
        }

        if self.config.weighting_enabled {
            self.weight_population()?;
        } else {
            self.reset_weights();
        }
        self.compute_zero_stats()?;

        self.state = PreparationState::Prepared;
        debug!(
            kind = K::NAME,
            speakers = self.speakers.len(),
            impostors = self.impostors.len(),
            weighting = self.config.weighting_enabled,
            normalization = %normalization,
            "models prepared"
        );
        Ok(())
    }

    fn population(&self) -> Vec<(Slot, &K::Model)> {
        let mut out = Vec::with_capacity(1 + self.speakers.len() + self.impostors.len());
        if let Some(bg) = &self.background {
            out.push((Slot::Background, bg));
        }
        out.extend(self.speakers.iter().map(|(k, m)| (Slot::Speaker(k.clone()), m)));
        out.extend(self.impostors.iter().map(|(k, m)| (Slot::Impostor(k.clone()), m)));
        out
    }

    fn slot_mut(&mut self, slot: &Slot) -> Option<&mut K::Model> {
        match slot {
            Slot::Background => self.background.as_mut(),
            Slot::Speaker(k) => self.speakers.get_mut(k),
            Slot::Impostor(k) => self.impostors.get_mut(k),
        }
    }

    fn weight_population(&mut self) -> Result<(), RecognizerError> {
        let pending = {
            let population = self.population();
            let mut pending = Vec::with_capacity(population.len());
            for (i, (slot, model)) in population.iter().enumerate() {
                let peers: Vec<&K::Model> = population
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, (_, m))| *m)
                    .collect();
                let weights = model
                    .weights_against(&peers)
                    .map_err(|e| attributed(slot.key(), e))?;
                pending.push((slot.clone(), weights));
            }
            pending
        };

        for (slot, weights) in pending {
            let Some(weights) = weights else { continue };
            if let Some(model) = self.slot_mut(&slot) {
                model
                    .apply_weights(weights)
                    .map_err(|e| attributed(slot.key(), e))?;
            }
        }
        Ok(())
    }

    fn reset_weights(&mut self) {
        if let Some(bg) = self.background.as_mut() {
            bg.reset_weights();
        }
        self.speakers
            .values_mut()
            .chain(self.impostors.values_mut())
            .for_each(|m| m.reset_weights());
    }

    fn compute_zero_stats(&mut self) -> Result<(), RecognizerError> {
        self.speaker_z.clear();
        self.impostor_z.clear();

        let normalization = self.config.score_normalization;
        if !normalization.uses_zero() {
            return Ok(());
        }

        let mut speaker_z = BTreeMap::new();
        for (key, model) in &self.speakers {
            speaker_z.insert(key.clone(), self.cohort_stats(key, model, None)?);
        }

        // Impostor statistics feed the T-norm cohort scores. An impostor's
        // own utterances are left out of its statistics.
        let mut impostor_z = BTreeMap::new();
        if normalization.uses_test() {
            for (key, model) in &self.impostors {
                impostor_z.insert(key.clone(), self.cohort_stats(key, model, Some(key))?);
            }
        }

        self.speaker_z = speaker_z;
        self.impostor_z = impostor_z;
        Ok(())
    }

    fn cohort_stats(
        &self,
        key: &SpeakerKey,
        model: &K::Model,
        exclude: Option<&SpeakerKey>,
    ) -> Result<ScoreStats, RecognizerError> {
        let mut scores = Vec::with_capacity(self.cohort.len());
        for (owner, utterance) in &self.cohort {
            if Some(owner) == exclude {
                continue;
            }
            let raw = self
                .raw_score(model, utterance)
                .map_err(|e| attributed(key.clone(), e))?;
            scores.push(raw);
        }
        ScoreStats::from_scores(&scores)
            .ok_or_else(|| invalid(format!("no cohort utterances to normalize {key}")))
    }

    fn raw_score(&self, model: &K::Model, utterance: &[FeatureVector]) -> Result<f64, ModelError> {
        let score = model.score(utterance)?;
        match &self.background {
            Some(bg) => Ok(score - bg.score(utterance)?),
            None => Ok(score),
        }
    }

    /// T-norm statistics of one utterance over the impostor models.
    fn test_stats(&self, utterance: &[FeatureVector]) -> Result<Option<ScoreStats>, RecognizerError> {
        if !self.config.score_normalization.uses_test() {
            return Ok(None);
        }
        let mut scores = Vec::with_capacity(self.impostors.len());
        for (key, model) in &self.impostors {
            let raw = self.raw_score(model, utterance)?;
            scores.push(match self.impostor_z.get(key) {
                Some(z) => z.apply(raw),
                None => raw,
            });
        }
        ScoreStats::from_scores(&scores)
            .map(Some)
            .ok_or_else(|| invalid("test normalization needs impostor models"))
    }

    fn normalize(&self, speaker: &SpeakerKey, raw: f64, test: Option<&ScoreStats>) -> f64 {
        let mut score = raw;
        if let Some(z) = self.speaker_z.get(speaker) {
            score = z.apply(score);
        }
        if let Some(t) = test {
            score = t.apply(score);
        }
        score
    }

    fn build_population(
        &self,
        data: &SpeechData,
    ) -> Result<BTreeMap<SpeakerKey, K::Model>, RecognizerError> {
        let params = self.config.adaptation();
        let mut models = BTreeMap::new();
        for speaker in data.speakers() {
            let frames = data.frames(speaker);
            let mut model = K::create_model(&self.config);
            let (trained, adapted) = match (&self.background, params.iterations > 0) {
                (Some(ubm), true) => (model.adapt(ubm, &frames, &params), true),
                _ => (model.train(&frames), false),
            };
            trained.map_err(|e| attributed(speaker.clone(), e))?;
            debug!(speaker = %speaker, frames = frames.len(), adapted, "model trained");
            models.insert(speaker.clone(), model);
        }
        Ok(models)
    }

    fn clear_population(&mut self) {
        self.speakers.clear();
        self.impostors.clear();
        self.cohort.clear();
        self.speaker_z.clear();
        self.impostor_z.clear();
    }
}

impl<K: ModelKind> Recognizer for ModelRecognizer<K> {
    fn kind(&self) -> &'static str {
        K::NAME
    }

    fn config(&self) -> &RecognizerConfig {
        &self.config
    }

    fn reconfigure(&mut self, config: RecognizerConfig) {
        if config.clustering_differs(&self.config) || !config.background_model_enabled {
            self.background = None;
        }
        if config.population_differs(&self.config) {
            self.clear_population();
            self.state = PreparationState::Untrained;
            debug!(kind = K::NAME, "population dropped after reconfiguration");
        } else if config.preparation_differs(&self.config)
            && self.state == PreparationState::Prepared
        {
            self.state = PreparationState::Dirty;
        }
        self.config = config;
    }

    fn speaker_data(&self) -> Option<Arc<SpeechData>> {
        self.speaker_data.clone()
    }

    fn set_speaker_data(&mut self, data: Arc<SpeechData>) {
        self.speaker_data = Some(data);
    }

    fn background_data(&self) -> Option<Arc<SpeechData>> {
        self.background_data.clone()
    }

    fn set_background_data(&mut self, data: Arc<SpeechData>) {
        self.background_data = Some(data);
    }

    fn train(&mut self, set: &TrainingSet<'_>) -> Result<(), RecognizerError> {
        self.config.validate()?;
        if set.speakers.is_empty() {
            return Err(invalid("no speakers to enroll"));
        }
        self.clear_population();
        self.state = PreparationState::Untrained;

        if !self.config.background_model_enabled {
            self.background = None;
        } else if self.config.background_model_training_enabled {
            let data = set
                .background
                .filter(|d| !d.is_empty())
                .ok_or_else(|| invalid("background model training needs background data"))?;
            let mut ubm = K::create_model(&self.config);
            ubm.train(&data.pooled_frames())
                .map_err(|e| attributed(SpeakerKey::background(), e))?;
            info!(kind = K::NAME, speakers = data.len(), "background model trained");
            self.background = Some(ubm);
        } else if self.background.is_none() {
            return Err(invalid(
                "background model training is disabled and no background model is trained",
            ));
        }

        self.speakers = self.build_population(set.speakers)?;
        if let Some(impostors) = set.impostors {
            self.impostors = self.build_population(impostors)?;
            self.cohort = impostors
                .iter()
                .flat_map(|(k, utts)| {
                    utts.iter()
                        .filter(|u| !u.is_empty())
                        .map(move |u| (k.clone(), u.clone()))
                })
                .collect();
        }

        self.state = PreparationState::Dirty;
        info!(
            kind = K::NAME,
            speakers = self.speakers.len(),
            impostors = self.impostors.len(),
            background = self.background.is_some(),
            "population trained"
        );
        Ok(())
    }

    fn identify(&mut self, utterance: &[FeatureVector]) -> Result<Identification, RecognizerError> {
        self.prepare_models()?;
        let test = self.test_stats(utterance)?;

        let mut best: Option<Identification> = None;
        for (speaker, model) in &self.speakers {
            let raw_score = self.raw_score(model, utterance)?;
            let score = self.normalize(speaker, raw_score, test.as_ref());
            if best.as_ref().is_none_or(|b| score > b.score) {
                best = Some(Identification {
                    speaker: speaker.clone(),
                    raw_score,
                    score,
                });
            }
        }
        best.ok_or(RecognizerError::NotTrained)
    }

    fn verify(
        &mut self,
        claimed: &SpeakerKey,
        utterance: &[FeatureVector],
    ) -> Result<Verification, RecognizerError> {
        self.prepare_models()?;
        let model = self
            .speakers
            .get(claimed)
            .ok_or_else(|| RecognizerError::UnknownSpeaker(claimed.clone()))?;

        let raw_score = self.raw_score(model, utterance)?;
        let test = self.test_stats(utterance)?;
        let score = self.normalize(claimed, raw_score, test.as_ref());
        Ok(Verification {
            claimed: claimed.clone(),
            raw_score,
            score,
            accepted: self.config.decision_threshold.map(|t| score >= t),
        })
    }

    fn enrolled(&self) -> Vec<SpeakerKey> {
        self.speakers.keys().cloned().collect()
    }
}

impl<K: ModelKind> fmt::Debug for ModelRecognizer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRecognizer")
            .field("kind", &K::NAME)
            .field("state", &self.state)
            .field("background", &self.background.is_some())
            .field("speakers", &self.speakers.len())
            .field("impostors", &self.impostors.len())
            .field("cohort", &self.cohort.len())
            .finish()
    }
}
