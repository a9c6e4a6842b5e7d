use std::path::Path;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

use crate::error::Result;

/// Audio extraction target: stereo PCM s16le at 44.1 kHz
pub const AUDIO_CODEC: &str = "pcm_s16le";
pub const AUDIO_SAMPLE_RATE: u32 = 44_100;
pub const AUDIO_CHANNELS: u32 = 2;

/// External media tool invocation (ffmpeg / ffprobe)
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file (or a positional path for ffprobe)
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-acodec").arg(codec)
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Force the container format (the output name may not carry an extension)
    pub fn format<S: Into<String>>(self, format: S) -> Self {
        self.arg("-f").arg(format)
    }

    /// Run the command to completion and hand back its raw output.
    ///
    /// A non-zero exit is not an error here; callers interpret stderr.
    pub async fn run(&self) -> Result<Output> {
        debug!("Executing media command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await?;

        Ok(output)
    }
}

/// Builder for the ffmpeg/ffprobe invocations the service needs
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Build stream/format probe command emitting JSON
    pub fn probe<P: AsRef<Path>>(&self, media_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Media probe")
            .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
            .output(media_path)
    }

    /// Build audio extraction command
    pub fn extract_audio<P: AsRef<Path>>(&self, video_path: P, audio_path: P) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio extraction")
            .arg("-nostdin")
            .input(video_path)
            .no_video()
            .audio_codec(AUDIO_CODEC)
            .audio_sample_rate(AUDIO_SAMPLE_RATE)
            .audio_channels(AUDIO_CHANNELS)
            .format("wav")
            .overwrite()
            .output(audio_path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Version check").arg("-version")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_audio_arguments() {
        let builder = MediaCommandBuilder::new("ffmpeg", "ffprobe");
        let cmd = builder.extract_audio("/videos/clip.mp4", "/videos/.clip.wav.part");

        assert_eq!(cmd.binary_path, "ffmpeg");
        assert_eq!(
            cmd.args,
            vec![
                "-nostdin", "-i", "/videos/clip.mp4", "-vn", "-acodec", "pcm_s16le", "-ar",
                "44100", "-ac", "2", "-f", "wav", "-y", "/videos/.clip.wav.part",
            ]
        );
    }

    #[test]
    fn test_probe_arguments() {
        let builder = MediaCommandBuilder::new("/opt/ffmpeg", "/opt/ffprobe");
        let cmd = builder.probe("clip.mov");

        assert_eq!(cmd.binary_path, "/opt/ffprobe");
        assert_eq!(cmd.args.last().map(String::as_str), Some("clip.mov"));
        assert!(cmd.args.iter().any(|a| a == "-show_streams"));
        assert!(cmd.args.iter().any(|a| a == "-show_format"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let cmd = MediaCommand::new("/nonexistent/ffmpeg-binary", "Missing").arg("-version");
        assert!(matches!(cmd.run().await, Err(crate::error::CaptionError::Io(_))));
    }
}
