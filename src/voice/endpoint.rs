//! 発話区間の検出（エンドポイント検出）
//!
//! 1発話分だけ録音して認識サービスに送るため、マイク入力を 20ms フレームに
//! 区切って RMS で有声/無声を判定し、発話の開始と終了を決める。
//!
//! - 開始: 最初の有声フレーム。直前の無音 (pre-roll) も発話に含める
//! - 終了: 一定時間の無音が続いたとき、または発話が上限長に達したとき
//! - 発話が始まらないまま待ち時間を超えたら `InitialSilenceTimeout`

use std::collections::VecDeque;
use std::time::Duration;

/// 録音期限に足す余裕
const DEADLINE_MARGIN: Duration = Duration::from_secs(5);

/// 有声/無声の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadDecision {
    Speech,
    Silence,
}

/// RMS しきい値 + ハングオーバーによる簡易 VAD
///
/// しきい値を下回っても `hangover_frames` の間は有声とみなし、
/// 語尾が切れるのを防ぐ。
#[derive(Debug, Clone)]
pub struct EnergyVad {
    threshold: f32,
    hangover_frames: u32,
    hangover_counter: u32,
}

impl EnergyVad {
    pub fn new(threshold: f32, hangover_frames: u32) -> Self {
        Self {
            threshold,
            hangover_frames,
            hangover_counter: 0,
        }
    }

    fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    pub fn classify(&mut self, frame: &[f32]) -> VadDecision {
        if Self::rms(frame) >= self.threshold {
            self.hangover_counter = self.hangover_frames;
            VadDecision::Speech
        } else if self.hangover_counter > 0 {
            self.hangover_counter -= 1;
            VadDecision::Speech
        } else {
            VadDecision::Silence
        }
    }
}

/// エンドポイント検出のパラメータ
#[derive(Debug, Clone)]
pub struct EndpointConfig {
    /// 入力のサンプリングレート（Hz）
    pub sample_rate: u32,
    pub frame_ms: u32,
    pub threshold: f32,
    pub hangover_frames: u32,
    /// この長さの無音が続いたら発話終了
    pub trailing_silence_ms: u32,
    /// 発話の最大長
    pub max_speech_ms: u32,
    /// 発話開始を待つ最大時間
    pub initial_silence_ms: u32,
    /// 発話開始前に残しておく音声の長さ
    pub pre_roll_ms: u32,
}

impl EndpointConfig {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            frame_ms: 20,
            threshold: 0.015,
            hangover_frames: 8,
            trailing_silence_ms: 800,
            max_speech_ms: 30_000,
            initial_silence_ms: 15_000,
            pre_roll_ms: 300,
        }
    }

    /// 1回の録音にかかりうる最長の時間（これを過ぎても区切れなければ入力が止まっている）
    pub fn capture_deadline(&self) -> Duration {
        Duration::from_millis(self.initial_silence_ms as u64 + self.max_speech_ms as u64)
            + DEADLINE_MARGIN
    }

    fn frame_len(&self) -> usize {
        ((self.sample_rate as u64 * self.frame_ms as u64) / 1000).max(1) as usize
    }

    fn frames_for(&self, ms: u32) -> u32 {
        (ms / self.frame_ms.max(1)).max(1)
    }
}

/// `push` のたびに返す検出状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointStatus {
    /// 発話開始を待っている
    Waiting,
    /// 発話中
    Speaking,
    /// 発話が終了した（`take_utterance` で取り出せる）
    Complete,
    /// 発話が始まらないまま待ち時間を超えた
    InitialSilenceTimeout,
}

#[derive(Debug)]
enum Phase {
    Waiting { waited_frames: u32 },
    Speaking { speech_frames: u32, silent_frames: u32 },
    Done(EndpointStatus),
}

/// モノラル f32 入力から1発話分を切り出すステートマシン
pub struct Endpointer {
    config: EndpointConfig,
    vad: EnergyVad,
    frame_len: usize,
    /// フレームに満たない端数
    pending: Vec<f32>,
    pre_roll: VecDeque<f32>,
    pre_roll_len: usize,
    utterance: Vec<f32>,
    phase: Phase,
}

impl Endpointer {
    pub fn new(config: EndpointConfig) -> Self {
        let frame_len = config.frame_len();
        let pre_roll_len =
            (config.sample_rate as u64 * config.pre_roll_ms as u64 / 1000) as usize;
        Self {
            vad: EnergyVad::new(config.threshold, config.hangover_frames),
            frame_len,
            pending: Vec::with_capacity(frame_len),
            pre_roll: VecDeque::with_capacity(pre_roll_len),
            pre_roll_len,
            utterance: Vec::new(),
            phase: Phase::Waiting { waited_frames: 0 },
            config,
        }
    }

    /// 入力サンプルを追加して現在の状態を返す
    ///
    /// 終了状態に達した後の入力は無視する。
    pub fn push(&mut self, samples: &[f32]) -> EndpointStatus {
        for &sample in samples {
            if let Phase::Done(status) = self.phase {
                return status;
            }
            self.pending.push(sample);
            if self.pending.len() == self.frame_len {
                let next = Vec::with_capacity(self.frame_len);
                let frame = std::mem::replace(&mut self.pending, next);
                self.process_frame(frame);
            }
        }
        self.status()
    }

    pub fn status(&self) -> EndpointStatus {
        match self.phase {
            Phase::Waiting { .. } => EndpointStatus::Waiting,
            Phase::Speaking { .. } => EndpointStatus::Speaking,
            Phase::Done(status) => status,
        }
    }

    /// 切り出した発話を取り出す（発話が無ければ空）
    ///
    /// 発話中に呼んだ場合は、そこまでの音声と端数を返す。
    pub fn take_utterance(&mut self) -> Vec<f32> {
        if matches!(self.phase, Phase::Speaking { .. }) {
            self.utterance.append(&mut self.pending);
        }
        std::mem::take(&mut self.utterance)
    }

    fn process_frame(&mut self, frame: Vec<f32>) {
        let decision = self.vad.classify(&frame);
        let trailing_limit = self.config.frames_for(self.config.trailing_silence_ms);
        let speech_limit = self.config.frames_for(self.config.max_speech_ms);
        let initial_limit = self.config.frames_for(self.config.initial_silence_ms);

        self.phase = match self.phase {
            Phase::Waiting { waited_frames } => {
                if decision == VadDecision::Speech {
                    self.utterance.extend(self.pre_roll.drain(..));
                    self.utterance.extend_from_slice(&frame);
                    Phase::Speaking {
                        speech_frames: 1,
                        silent_frames: 0,
                    }
                } else {
                    self.pre_roll.extend(frame.iter().copied());
                    while self.pre_roll.len() > self.pre_roll_len {
                        self.pre_roll.pop_front();
                    }
                    let waited_frames = waited_frames + 1;
                    if waited_frames >= initial_limit {
                        Phase::Done(EndpointStatus::InitialSilenceTimeout)
                    } else {
                        Phase::Waiting { waited_frames }
                    }
                }
            }
            Phase::Speaking {
                speech_frames,
                silent_frames,
            } => {
                self.utterance.extend_from_slice(&frame);
                let speech_frames = speech_frames + 1;
                let silent_frames = match decision {
                    VadDecision::Speech => 0,
                    VadDecision::Silence => silent_frames + 1,
                };
                if silent_frames >= trailing_limit || speech_frames >= speech_limit {
                    Phase::Done(EndpointStatus::Complete)
                } else {
                    Phase::Speaking {
                        speech_frames,
                        silent_frames,
                    }
                }
            }
            Phase::Done(status) => Phase::Done(status),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;
    /// 20ms = 320 サンプル
    const FRAME: usize = 320;

    fn silence(frames: usize) -> Vec<f32> {
        vec![0.0; FRAME * frames]
    }

    fn tone(frames: usize) -> Vec<f32> {
        (0..FRAME * frames)
            .map(|i| if i % 2 == 0 { 0.3 } else { -0.3 })
            .collect()
    }

    fn quick_config() -> EndpointConfig {
        EndpointConfig {
            hangover_frames: 0,
            trailing_silence_ms: 100, // 5 フレーム
            initial_silence_ms: 200,  // 10 フレーム
            max_speech_ms: 1_000,     // 50 フレーム
            pre_roll_ms: 40,          // 2 フレーム
            ..EndpointConfig::new(RATE)
        }
    }

    #[test]
    fn test_vad_hangover_extends_speech() {
        let mut vad = EnergyVad::new(0.02, 2);
        assert_eq!(vad.classify(&tone(1)), VadDecision::Speech);
        assert_eq!(vad.classify(&silence(1)), VadDecision::Speech);
        assert_eq!(vad.classify(&silence(1)), VadDecision::Speech);
        assert_eq!(vad.classify(&silence(1)), VadDecision::Silence);
    }

    #[test]
    fn test_capture_deadline_covers_longest_capture() {
        let config = EndpointConfig::new(16_000);
        assert_eq!(
            config.capture_deadline(),
            Duration::from_millis(15_000 + 30_000) + DEADLINE_MARGIN
        );
    }

    #[test]
    fn test_vad_empty_frame_is_silence() {
        let mut vad = EnergyVad::new(0.02, 0);
        assert_eq!(vad.classify(&[]), VadDecision::Silence);
    }

    #[test]
    fn test_waiting_on_silence() {
        let mut ep = Endpointer::new(quick_config());
        assert_eq!(ep.push(&silence(3)), EndpointStatus::Waiting);
    }

    #[test]
    fn test_initial_silence_timeout() {
        let mut ep = Endpointer::new(quick_config());
        assert_eq!(ep.push(&silence(10)), EndpointStatus::InitialSilenceTimeout);
        assert!(ep.take_utterance().is_empty());
    }

    #[test]
    fn test_utterance_completes_after_trailing_silence() {
        let mut ep = Endpointer::new(quick_config());
        ep.push(&silence(4));
        assert_eq!(ep.push(&tone(6)), EndpointStatus::Speaking);
        assert_eq!(ep.push(&silence(4)), EndpointStatus::Speaking);
        assert_eq!(ep.push(&silence(1)), EndpointStatus::Complete);

        // pre-roll 2 + 発話 6 + 無音 5 フレーム
        let utterance = ep.take_utterance();
        assert_eq!(utterance.len(), FRAME * (2 + 6 + 5));
    }

    #[test]
    fn test_input_after_complete_is_ignored() {
        let mut ep = Endpointer::new(quick_config());
        ep.push(&tone(2));
        ep.push(&silence(5));
        assert_eq!(ep.push(&tone(10)), EndpointStatus::Complete);
        assert_eq!(ep.take_utterance().len(), FRAME * 7);
    }

    #[test]
    fn test_max_speech_length_cuts_utterance() {
        let mut ep = Endpointer::new(quick_config());
        assert_eq!(ep.push(&tone(60)), EndpointStatus::Complete);
        assert_eq!(ep.take_utterance().len(), FRAME * 50);
    }

    #[test]
    fn test_take_while_speaking_includes_pending() {
        let mut ep = Endpointer::new(quick_config());
        let mut input = tone(2);
        input.extend(vec![0.3f32; 10]);
        ep.push(&input);
        assert_eq!(ep.take_utterance().len(), FRAME * 2 + 10);
    }
}
