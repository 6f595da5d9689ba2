use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::oneshot;

use crate::analysis::TextAnalysisAdapter;
use crate::backend::{Analyzer, PresetStore, StyleCatalog, SynthesisCore};
use crate::config::{EngineConfig, QueryDefaults};
use crate::error::{EngineError, EngineErrorDescription};
use crate::kana;
use crate::mock::{MockAnalyzer, MockCore, StaticCatalog, StaticPresets};
use crate::preset::{PresetResolver, ResolvedPreset};
use crate::prosody::ProsodyFiller;
use crate::query::QueryBuilder;
use crate::store::{PresetFile, SpeakersFile};
use crate::synthesis::{self, SynthesisOptions, Synthesizer};
use crate::types::{self, AccentPhrase, AudioQuery, Preset, PresetId, Speaker, StyleId};

/// Every operation of the engine. Holds no mutable state of its own, so clones
/// can serve requests on any thread.
#[derive(Clone)]
pub struct Engine {
    builder: QueryBuilder,
    presets: PresetResolver,
    synthesizer: Synthesizer,
    catalog: Arc<dyn StyleCatalog>,
}

impl Engine {
    pub fn new(
        analyzer: Arc<dyn Analyzer>,
        core: Arc<dyn SynthesisCore>,
        catalog: Arc<dyn StyleCatalog>,
        presets: Arc<dyn PresetStore>,
        defaults: QueryDefaults,
    ) -> Self {
        let analysis = TextAnalysisAdapter::new(analyzer);
        let filler = ProsodyFiller::new(core.clone(), catalog.clone());
        Self {
            builder: QueryBuilder::new(analysis, filler, defaults),
            presets: PresetResolver::new(presets, catalog.clone()),
            synthesizer: Synthesizer::new(core, catalog.clone()),
            catalog,
        }
    }

    /// Engine reading presets and speakers from the files named in `config`.
    pub fn with_files(config: &EngineConfig, analyzer: Arc<dyn Analyzer>, core: Arc<dyn SynthesisCore>) -> Self {
        Self::new(
            analyzer,
            core,
            Arc::new(SpeakersFile::new(&config.speakers_path)),
            Arc::new(PresetFile::new(&config.presets_path)),
            config.query_defaults(),
        )
    }

    /// Engine backed by the mock analyzer and core, with in-memory speakers and presets.
    pub fn mock(presets: Vec<Preset>, defaults: QueryDefaults) -> Self {
        Self::new(
            Arc::new(MockAnalyzer::new()),
            Arc::new(MockCore::new()),
            Arc::new(StaticCatalog::sample()),
            Arc::new(StaticPresets::new(presets)),
            defaults,
        )
    }

    pub fn build_query(&self, text: &str, style_id: StyleId, is_kana: bool) -> Result<AudioQuery, EngineError> {
        self.builder.build_query(text, style_id, is_kana)
    }

    pub fn build_query_from_preset(&self, text: &str, preset_id: PresetId) -> Result<AudioQuery, EngineError> {
        let ResolvedPreset { style_id, overrides } = self.presets.resolve(preset_id)?;
        self.builder.build_query_with(text, style_id, false, &overrides)
    }

    pub fn create_accent_phrases(&self, text: &str, style_id: StyleId, is_kana: bool) -> Result<Vec<AccentPhrase>, EngineError> {
        self.builder.create_accent_phrases(text, style_id, is_kana)
    }

    /// Discards any numbers on `accent_phrases` and predicts them again.
    pub fn refine_accent_phrases(&self, accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Result<Vec<AccentPhrase>, EngineError> {
        self.builder.filler().replace_mora_data(accent_phrases, style_id)
    }

    pub fn mora_length(&self, accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Result<Vec<AccentPhrase>, EngineError> {
        self.builder.filler().replace_phoneme_length(accent_phrases, style_id)
    }

    pub fn mora_pitch(&self, accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Result<Vec<AccentPhrase>, EngineError> {
        self.builder.filler().replace_mora_pitch(accent_phrases, style_id)
    }

    pub fn replace_accent_phrases_from_kana(&self, query: &mut AudioQuery, kana: &str, style_id: StyleId) -> Result<(), EngineError> {
        self.builder.replace_accent_phrases_from_kana(query, kana, style_id)
    }

    pub fn encode_kana(&self, accent_phrases: &[AccentPhrase]) -> Result<String, EngineError> {
        types::check_structure(accent_phrases)?;
        Ok(kana::encode(accent_phrases))
    }

    pub fn decode_kana(&self, text: &str) -> Result<Vec<AccentPhrase>, EngineError> {
        Ok(kana::decode(text)?)
    }

    pub fn resolve_preset(&self, preset_id: PresetId) -> Result<ResolvedPreset, EngineError> {
        self.presets.resolve(preset_id)
    }

    pub fn presets(&self) -> Result<Vec<Preset>, EngineError> {
        self.presets.presets()
    }

    pub fn speakers(&self) -> Result<Vec<Speaker>, EngineError> {
        Ok(self.catalog.speakers()?)
    }

    pub fn synthesize(&self, query: &AudioQuery, style_id: StyleId, options: SynthesisOptions) -> Result<Vec<u8>, EngineError> {
        self.synthesizer.synthesize(query, style_id, options)
    }

    pub fn multi_synthesis(&self, queries: &[AudioQuery], style_id: StyleId) -> Result<Vec<Vec<u8>>, EngineError> {
        self.synthesizer.multi_synthesis(queries, style_id)
    }

    pub fn connect_waves(&self, waves: &[Vec<u8>]) -> Result<Vec<u8>, EngineError> {
        synthesis::connect_waves(waves)
    }
}

struct EngineRequestData<Req, Res> {
    req: Req,
    res_sender: oneshot::Sender<Res>,
}

impl<Req, Res> EngineRequestData<Req, Res>
where
    Req: Send + 'static,
    Res: Send + 'static,
{
    fn new(req: Req) -> (Self, oneshot::Receiver<Res>) {
        let (res_sender, res_receiver) = oneshot::channel();
        (Self { req, res_sender }, res_receiver)
    }

    fn reply(self, compute: impl FnOnce(Req) -> Res) {
        let res = compute(self.req);
        if self.res_sender.send(res).is_err() {
            log::debug!("Requester went away before the reply was ready");
        }
    }
}

impl<Req, Res> Debug for EngineRequestData<Req, Res>
where
    Req: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRequestData")
            .field("req", &self.req)
            .finish_non_exhaustive()
    }
}

type Reply<T> = Result<T, EngineError>;

#[derive(Debug)]
enum EngineRequest {
    AudioQuery(EngineRequestData<(String, StyleId, bool), Reply<AudioQuery>>),
    AudioQueryFromPreset(EngineRequestData<(String, PresetId), Reply<AudioQuery>>),
    AccentPhrases(EngineRequestData<(String, StyleId, bool), Reply<Vec<AccentPhrase>>>),
    MoraData(EngineRequestData<(Vec<AccentPhrase>, StyleId), Reply<Vec<AccentPhrase>>>),
    MoraLength(EngineRequestData<(Vec<AccentPhrase>, StyleId), Reply<Vec<AccentPhrase>>>),
    MoraPitch(EngineRequestData<(Vec<AccentPhrase>, StyleId), Reply<Vec<AccentPhrase>>>),
    Synthesis(EngineRequestData<(AudioQuery, StyleId, SynthesisOptions), Reply<Vec<u8>>>),
    MultiSynthesis(EngineRequestData<(Vec<AudioQuery>, StyleId), Reply<Vec<Vec<u8>>>>),
    ConnectWaves(EngineRequestData<Vec<Vec<u8>>, Reply<Vec<u8>>>),
    Presets(EngineRequestData<(), Reply<Vec<Preset>>>),
    Speakers(EngineRequestData<(), Reply<Vec<Speaker>>>),
}

impl EngineRequest {
    fn handle(self, engine: &Engine) {
        match self {
            Self::AudioQuery(data) => data.reply(|(text, style_id, is_kana)| engine.build_query(&text, style_id, is_kana)),
            Self::AudioQueryFromPreset(data) => data.reply(|(text, preset_id)| engine.build_query_from_preset(&text, preset_id)),
            Self::AccentPhrases(data) => {
                data.reply(|(text, style_id, is_kana)| engine.create_accent_phrases(&text, style_id, is_kana))
            }
            Self::MoraData(data) => data.reply(|(phrases, style_id)| engine.refine_accent_phrases(phrases, style_id)),
            Self::MoraLength(data) => data.reply(|(phrases, style_id)| engine.mora_length(phrases, style_id)),
            Self::MoraPitch(data) => data.reply(|(phrases, style_id)| engine.mora_pitch(phrases, style_id)),
            Self::Synthesis(data) => data.reply(|(query, style_id, options)| engine.synthesize(&query, style_id, options)),
            Self::MultiSynthesis(data) => data.reply(|(queries, style_id)| engine.multi_synthesis(&queries, style_id)),
            Self::ConnectWaves(data) => data.reply(|waves| engine.connect_waves(&waves)),
            Self::Presets(data) => data.reply(|()| engine.presets()),
            Self::Speakers(data) => data.reply(|()| engine.speakers()),
        }
    }
}

struct Runner {
    engine: Engine,
    receiver: Arc<Mutex<mpsc::Receiver<EngineRequest>>>,
}

impl Runner {
    fn run(self, index: usize) {
        log::debug!("Engine worker {} started", index);
        loop {
            let request = self.receiver.lock().blocking_recv();
            match request {
                Some(request) => request.handle(&self.engine),
                None => break,
            }
        }
        log::warn!("Engine worker {} exited", index);
    }
}

/// Sends requests to a pool of worker threads that own clones of an [`Engine`].
/// Workers exit once every handle has been dropped.
///
/// The `*_blocking` methods must not be called from inside an async runtime.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub fn start(engine: Engine, workers: usize) -> Self {
        let (req_sender, req_receiver) = mpsc::channel(100);
        let receiver = Arc::new(Mutex::new(req_receiver));

        for index in 0..workers.max(1) {
            let runner = Runner {
                engine: engine.clone(),
                receiver: receiver.clone(),
            };
            std::thread::spawn(move || {
                runner.run(index);
            });
        }

        Self { sender: req_sender }
    }

    pub async fn audio_query(&self, text: String, style_id: StyleId, is_kana: bool) -> Reply<AudioQuery> {
        let (data, receiver) = EngineRequestData::new((text, style_id, is_kana));
        self.request(EngineRequest::AudioQuery(data), receiver).await
    }

    pub async fn audio_query_from_preset(&self, text: String, preset_id: PresetId) -> Reply<AudioQuery> {
        let (data, receiver) = EngineRequestData::new((text, preset_id));
        self.request(EngineRequest::AudioQueryFromPreset(data), receiver).await
    }

    pub async fn accent_phrases(&self, text: String, style_id: StyleId, is_kana: bool) -> Reply<Vec<AccentPhrase>> {
        let (data, receiver) = EngineRequestData::new((text, style_id, is_kana));
        self.request(EngineRequest::AccentPhrases(data), receiver).await
    }

    pub async fn mora_data(&self, accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Reply<Vec<AccentPhrase>> {
        let (data, receiver) = EngineRequestData::new((accent_phrases, style_id));
        self.request(EngineRequest::MoraData(data), receiver).await
    }

    pub async fn mora_length(&self, accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Reply<Vec<AccentPhrase>> {
        let (data, receiver) = EngineRequestData::new((accent_phrases, style_id));
        self.request(EngineRequest::MoraLength(data), receiver).await
    }

    pub async fn mora_pitch(&self, accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Reply<Vec<AccentPhrase>> {
        let (data, receiver) = EngineRequestData::new((accent_phrases, style_id));
        self.request(EngineRequest::MoraPitch(data), receiver).await
    }

    pub async fn synthesize(&self, query: AudioQuery, style_id: StyleId, options: SynthesisOptions) -> Reply<Vec<u8>> {
        let (data, receiver) = EngineRequestData::new((query, style_id, options));
        self.request(EngineRequest::Synthesis(data), receiver).await
    }

    pub async fn multi_synthesis(&self, queries: Vec<AudioQuery>, style_id: StyleId) -> Reply<Vec<Vec<u8>>> {
        let (data, receiver) = EngineRequestData::new((queries, style_id));
        self.request(EngineRequest::MultiSynthesis(data), receiver).await
    }

    pub async fn connect_waves(&self, waves: Vec<Vec<u8>>) -> Reply<Vec<u8>> {
        let (data, receiver) = EngineRequestData::new(waves);
        self.request(EngineRequest::ConnectWaves(data), receiver).await
    }

    pub async fn presets(&self) -> Reply<Vec<Preset>> {
        let (data, receiver) = EngineRequestData::new(());
        self.request(EngineRequest::Presets(data), receiver).await
    }

    pub async fn speakers(&self) -> Reply<Vec<Speaker>> {
        let (data, receiver) = EngineRequestData::new(());
        self.request(EngineRequest::Speakers(data), receiver).await
    }

    pub fn audio_query_blocking(&self, text: String, style_id: StyleId, is_kana: bool) -> Reply<AudioQuery> {
        let (data, receiver) = EngineRequestData::new((text, style_id, is_kana));
        self.request_blocking(EngineRequest::AudioQuery(data), receiver)
    }

    pub fn audio_query_from_preset_blocking(&self, text: String, preset_id: PresetId) -> Reply<AudioQuery> {
        let (data, receiver) = EngineRequestData::new((text, preset_id));
        self.request_blocking(EngineRequest::AudioQueryFromPreset(data), receiver)
    }

    pub fn accent_phrases_blocking(&self, text: String, style_id: StyleId, is_kana: bool) -> Reply<Vec<AccentPhrase>> {
        let (data, receiver) = EngineRequestData::new((text, style_id, is_kana));
        self.request_blocking(EngineRequest::AccentPhrases(data), receiver)
    }

    pub fn mora_data_blocking(&self, accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Reply<Vec<AccentPhrase>> {
        let (data, receiver) = EngineRequestData::new((accent_phrases, style_id));
        self.request_blocking(EngineRequest::MoraData(data), receiver)
    }

    pub fn mora_length_blocking(&self, accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Reply<Vec<AccentPhrase>> {
        let (data, receiver) = EngineRequestData::new((accent_phrases, style_id));
        self.request_blocking(EngineRequest::MoraLength(data), receiver)
    }

    pub fn mora_pitch_blocking(&self, accent_phrases: Vec<AccentPhrase>, style_id: StyleId) -> Reply<Vec<AccentPhrase>> {
        let (data, receiver) = EngineRequestData::new((accent_phrases, style_id));
        self.request_blocking(EngineRequest::MoraPitch(data), receiver)
    }

    pub fn synthesize_blocking(&self, query: AudioQuery, style_id: StyleId, options: SynthesisOptions) -> Reply<Vec<u8>> {
        let (data, receiver) = EngineRequestData::new((query, style_id, options));
        self.request_blocking(EngineRequest::Synthesis(data), receiver)
    }

    pub fn multi_synthesis_blocking(&self, queries: Vec<AudioQuery>, style_id: StyleId) -> Reply<Vec<Vec<u8>>> {
        let (data, receiver) = EngineRequestData::new((queries, style_id));
        self.request_blocking(EngineRequest::MultiSynthesis(data), receiver)
    }

    pub fn connect_waves_blocking(&self, waves: Vec<Vec<u8>>) -> Reply<Vec<u8>> {
        let (data, receiver) = EngineRequestData::new(waves);
        self.request_blocking(EngineRequest::ConnectWaves(data), receiver)
    }

    pub fn presets_blocking(&self) -> Reply<Vec<Preset>> {
        let (data, receiver) = EngineRequestData::new(());
        self.request_blocking(EngineRequest::Presets(data), receiver)
    }

    pub fn speakers_blocking(&self) -> Reply<Vec<Speaker>> {
        let (data, receiver) = EngineRequestData::new(());
        self.request_blocking(EngineRequest::Speakers(data), receiver)
    }

    async fn request<T>(&self, request: EngineRequest, receiver: oneshot::Receiver<Reply<T>>) -> Reply<T> {
        self.sender.send(request).await.map_err(|_| not_running())?;
        receiver.await.map_err(|_| not_running())?
    }

    fn request_blocking<T>(&self, request: EngineRequest, receiver: oneshot::Receiver<Reply<T>>) -> Reply<T> {
        self.sender.blocking_send(request).map_err(|_| not_running())?;
        receiver.blocking_recv().map_err(|_| not_running())?
    }
}

fn not_running() -> EngineError {
    EngineError::new(EngineErrorDescription::NotRunning)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StructureError;

    fn preset(id: PresetId, style_id: StyleId) -> Preset {
        Preset {
            id,
            name: "slow".to_string(),
            speaker_uuid: "388f246b-8c41-4ac1-8e2d-5d79f3ff56d9".to_string(),
            style_id,
            speed_scale: 0.8,
            pitch_scale: 0.0,
            intonation_scale: 1.2,
            volume_scale: 1.0,
            pre_phoneme_length: 0.3,
            post_phoneme_length: 0.2,
        }
    }

    fn engine() -> Engine {
        Engine::mock(vec![preset(1, 2)], QueryDefaults::default())
    }

    #[test]
    fn query_from_preset_uses_preset_style_and_scales() {
        let engine = engine();
        let from_preset = engine.build_query_from_preset("あめ", 1).unwrap();
        let direct = engine.build_query("あめ", 2, false).unwrap();

        assert_eq!(from_preset.accent_phrases, direct.accent_phrases);
        assert_eq!(from_preset.speed_scale, 0.8);
        assert_eq!(from_preset.intonation_scale, 1.2);
        assert_eq!(from_preset.pre_phoneme_length, 0.3);
        assert_eq!(from_preset.output_sampling_rate, direct.output_sampling_rate);
    }

    #[test]
    fn refine_discards_edited_numbers() {
        let engine = engine();
        let fresh = engine.create_accent_phrases("ア'メ", 0, true).unwrap();
        let mut edited = fresh.clone();
        edited[0].moras[0].pitch = 9.0;
        edited[0].moras[1].vowel_length = 1.0;
        assert_eq!(engine.refine_accent_phrases(edited, 0).unwrap(), fresh);
    }

    #[test]
    fn mora_length_keeps_pitch() {
        let engine = engine();
        let mut phrases = engine.create_accent_phrases("ア'メ", 0, true).unwrap();
        phrases[0].moras[0].pitch = 6.0;
        phrases[0].moras[0].vowel_length = 1.0;

        let lengths = engine.mora_length(phrases.clone(), 0).unwrap();
        assert_eq!(lengths[0].moras[0].pitch, 6.0);
        assert!(lengths[0].moras[0].vowel_length < 1.0);

        let pitch = engine.mora_pitch(phrases, 0).unwrap();
        assert_eq!(pitch[0].moras[0].vowel_length, 1.0);
        assert!(pitch[0].moras[0].pitch < 6.0);
    }

    #[test]
    fn kana_passthrough() {
        let engine = engine();
        let phrases = engine.decode_kana("ア'メ、フ'ル").unwrap();
        assert_eq!(engine.encode_kana(&phrases).unwrap(), "ア'メ、フ'ル");
        assert!(engine.decode_kana("アメ").is_err());
    }

    #[test]
    fn zero_pitch_edit_shows_as_devoiced_notation() {
        let engine = engine();
        let mut query = engine.build_query("ア'メ", 0, true).unwrap();
        query.accent_phrases[0].moras[1].pitch = 0.0;
        assert_eq!(engine.encode_kana(&query.accent_phrases).unwrap(), "ア'_メ");
    }

    #[test]
    fn malformed_phrases_are_rejected_before_prediction() {
        let engine = engine();
        let mut phrases = engine.create_accent_phrases("ア'メ", 0, true).unwrap();

        phrases[0].accent = 0;
        let err = engine.refine_accent_phrases(phrases.clone(), 0).unwrap_err();
        assert!(matches!(
            err.as_inner(),
            EngineErrorDescription::InvalidAccentPhrase(StructureError::AccentOutOfRange { phrase: 1, accent: 0, len: 2 })
        ));
        assert!(err.as_inner().is_client_error());
        assert!(engine.encode_kana(&phrases).is_err());

        phrases[0].accent = 9;
        assert!(engine.mora_length(phrases.clone(), 0).is_err());
        assert!(engine.mora_pitch(phrases, 0).is_err());
    }

    #[test]
    fn empty_phrase_is_rejected_by_encode_and_synthesis() {
        let engine = engine();
        let mut query = engine.build_query("ア'メ", 0, true).unwrap();
        query.accent_phrases.insert(0, AccentPhrase::new(Vec::new(), 1));

        let err = engine.encode_kana(&query.accent_phrases).unwrap_err();
        assert!(matches!(
            err.as_inner(),
            EngineErrorDescription::InvalidAccentPhrase(StructureError::NoMoras { phrase: 1 })
        ));
        let err = engine.synthesize(&query, 0, SynthesisOptions::default()).unwrap_err();
        assert!(matches!(err.as_inner(), EngineErrorDescription::InvalidAccentPhrase(_)));
    }

    #[test]
    fn blocking_handle_round_trip() {
        let handle = EngineHandle::start(engine(), 2);
        let query = handle.audio_query_blocking("ア'メ".to_string(), 0, true).unwrap();
        let wav = handle.synthesize_blocking(query, 0, SynthesisOptions::default()).unwrap();
        assert_eq!(&wav[..4], b"RIFF");

        let err = handle.audio_query_from_preset_blocking("あめ".to_string(), 9).unwrap_err();
        assert!(matches!(err.as_inner(), EngineErrorDescription::PresetNotFound(9)));
    }

    #[test]
    fn blocking_handle_covers_every_engine_operation() {
        let engine = engine();
        let handle = EngineHandle::start(engine.clone(), 2);

        let phrases = engine.decode_kana("ア'メ/フ'ル").unwrap();
        assert_eq!(
            handle.mora_length_blocking(phrases.clone(), 1).unwrap(),
            engine.mora_length(phrases.clone(), 1).unwrap()
        );
        assert_eq!(
            handle.mora_pitch_blocking(phrases.clone(), 1).unwrap(),
            engine.mora_pitch(phrases, 1).unwrap()
        );

        let queries = vec![
            engine.build_query("ア'メ", 0, true).unwrap(),
            engine.build_query("フ'ル", 0, true).unwrap(),
        ];
        let waves = handle.multi_synthesis_blocking(queries, 0).unwrap();
        assert_eq!(waves.len(), 2);
        let joined = handle.connect_waves_blocking(waves.clone()).unwrap();
        assert_eq!(joined, engine.connect_waves(&waves).unwrap());

        assert_eq!(handle.presets_blocking().unwrap(), engine.presets().unwrap());
        assert_eq!(handle.speakers_blocking().unwrap(), engine.speakers().unwrap());

        let err = handle.connect_waves_blocking(vec![b"not a wave".to_vec()]).unwrap_err();
        assert!(matches!(err.as_inner(), EngineErrorDescription::Audio(_)));
    }

    #[tokio::test]
    async fn async_handle_serves_concurrent_requests() {
        let handle = EngineHandle::start(engine(), 3);
        let tasks: Vec<_> = (0..4)
            .map(|style_id| {
                let handle = handle.clone();
                tokio::spawn(async move { handle.accent_phrases("ア'メ/フ'ル".to_string(), style_id, true).await })
            })
            .collect();
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap().len(), 2);
        }

        let phrases = handle.accent_phrases("ア'メ".to_string(), 0, true).await.unwrap();
        let refined = handle.mora_data(phrases.clone(), 0).await.unwrap();
        assert_eq!(refined, phrases);
    }
}
