//! Spoken briefing: text-to-speech through the model and WAV packaging.

use crate::agent::gemini::{GeminiClient, GenerateRequest};
use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::json;
use tracing::info;

/// Size of the canonical RIFF/WAVE header.
pub const WAV_HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;

/// Build the speech request for a SITREP.
pub fn speech_request(sitrep: &str, voice: &str) -> GenerateRequest {
    let mut request =
        GenerateRequest::prompt(format!("Read this sitrep professionally: {}", sitrep));
    request.generation_config = Some(json!({
        "responseModalities": ["AUDIO"],
        "speechConfig": {
            "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": voice } }
        }
    }));
    request
}

/// Synthesize a SITREP and return it as a WAV file.
pub async fn synthesize_briefing(
    client: &GeminiClient,
    sitrep: &str,
    sample_rate: u32,
) -> Result<Vec<u8>> {
    let config = client.config();
    info!("Synthesizing voice briefing with voice {}", config.voice);

    let request = speech_request(sitrep, &config.voice);
    let response = client.generate_with(&config.tts_model, &request).await?;

    let inline = response
        .inline_data()
        .ok_or_else(|| anyhow!("Speech response carried no audio"))?;

    let pcm = STANDARD
        .decode(inline.data.trim())
        .context("Speech payload is not valid base64")?;

    Ok(encode_wav(&pcm, sample_rate))
}

/// Wrap 16-bit mono little-endian PCM in a WAV container.
pub fn encode_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * block_align as u32;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");

    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes(bytes[offset..offset + 2].try_into().unwrap())
    }

    #[test]
    fn test_wav_header_layout() {
        let pcm = vec![0x01, 0x00, 0xff, 0x7f];
        let wav = encode_wav(&pcm, 24_000);

        assert_eq!(wav.len(), WAV_HEADER_LEN + pcm.len());
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32_at(&wav, 4), 36 + 4);
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(&wav[12..16], b"fmt ");
        assert_eq!(u32_at(&wav, 16), 16);
        assert_eq!(u16_at(&wav, 20), 1);
        assert_eq!(u16_at(&wav, 22), 1);
        assert_eq!(u32_at(&wav, 24), 24_000);
        assert_eq!(u32_at(&wav, 28), 48_000);
        assert_eq!(u16_at(&wav, 32), 2);
        assert_eq!(u16_at(&wav, 34), 16);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(u32_at(&wav, 40), 4);
        assert_eq!(&wav[44..], &pcm[..]);
    }

    #[test]
    fn test_empty_pcm() {
        let wav = encode_wav(&[], 16_000);
        assert_eq!(wav.len(), WAV_HEADER_LEN);
        assert_eq!(u32_at(&wav, 4), 36);
        assert_eq!(u32_at(&wav, 40), 0);
    }

    #[test]
    fn test_speech_request_shape() {
        let request = speech_request("All quiet.", "Puck");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value["contents"][0]["parts"][0]["text"],
            "Read this sitrep professionally: All quiet."
        );
        assert_eq!(value["generationConfig"]["responseModalities"][0], "AUDIO");
        let voice = &value["generationConfig"]["speechConfig"]["voiceConfig"];
        assert_eq!(voice["prebuiltVoiceConfig"]["voiceName"], "Puck");
    }
}
