use anyhow::{Context, Result};

use crate::data::{
    cifar::{Image, IMG_CHANNELS, IMG_HEIGHT, IMG_WIDTH},
    Normalization,
};

pub fn get_env(key: &str) -> Result<String> {
    std::env::var(key).context(format!("getting env varaible `{key}`"))
}

/// Like [`get_env`] for optional settings; empty values count as unset.
pub fn env_var(key: &str) -> Option<String> {
    get_env(key).ok().filter(|value| !value.is_empty())
}

/// Logs this crate at `info` unless `RUST_LOG` says otherwise. A logger that
/// is already installed is kept.
pub fn init_logger() {
    let env = env_logger::Env::default().default_filter_or("cifar_classifiers=info");
    let _ = env_logger::Builder::from_env(env).try_init();
}

pub fn show_image_terminal_color(img: &Image) {
    for row in img {
        for p in row {
            let color = termion::color::Rgb(
                (p[0] * 255.0) as _,
                (p[1] * 255.0) as _,
                (p[2] * 255.0) as _,
            );
            print!("{}  ", termion::color::Bg(color));
        }
        println!("{}", termion::color::Bg(termion::color::Reset));
    }
}

pub fn buffer_to_image(img: &Image) -> image::DynamicImage {
    let height = img.len() as u32;
    let width = img.first().map(|row| row.len()).unwrap_or(0) as u32;
    let imgbuf = image::RgbImage::from_fn(width, height, |x, y| {
        let p = img[y as usize][x as usize];
        image::Rgb([
            (p[0] * 255.0).round() as u8,
            (p[1] * 255.0).round() as u8,
            (p[2] * 255.0).round() as u8,
        ])
    });
    imgbuf.into()
}

/// Pixel statistics of a dataset, overall and per channel.
#[derive(Debug, Clone, Copy)]
pub struct Stats {
    pub count: usize,
    pub dim: [usize; 3],
    pub value_range: [f32; 2],
    pub mean: f32,
    pub var: f32,
    pub stddev: f32,
    pub channel_mean: [f32; 3],
    pub channel_stddev: [f32; 3],
}

impl Stats {
    pub fn from_iter(iter: impl Iterator<Item = Image>) -> Self {
        let mut s = [0f64; 3];
        let mut s2 = [0f64; 3];
        let mut count = 0;
        let mut value_range = [f32::INFINITY, f32::NEG_INFINITY];

        for item in iter {
            for pixel in item.iter().flatten() {
                for (c, &x) in pixel.iter().enumerate() {
                    value_range[0] = value_range[0].min(x);
                    value_range[1] = value_range[1].max(x);
                    s[c] += x as f64;
                    s2[c] += (x * x) as f64;
                }
            }
            count += 1;
        }

        let dim = [IMG_HEIGHT as usize, IMG_WIDTH as usize, IMG_CHANNELS as usize];
        let per_channel = (count * dim[0] * dim[1]).max(1) as f64;

        let channel_mean = s.map(|s| s / per_channel);
        let channel_var =
            [0, 1, 2].map(|c| s2[c] / per_channel - channel_mean[c] * channel_mean[c]);

        let mean = channel_mean.iter().sum::<f64>() / 3.0;
        let var = s2.iter().sum::<f64>() / (3.0 * per_channel) - mean * mean;

        if count == 0 {
            value_range = [0.0, 0.0];
        }

        Self {
            count,
            dim,
            value_range,
            mean: mean as f32,
            var: var as f32,
            stddev: var.max(0.0).sqrt() as f32,
            channel_mean: channel_mean.map(|m| m as f32),
            channel_stddev: channel_var.map(|v| v.max(0.0).sqrt() as f32),
        }
    }

    /// Normalization that maps this data to zero mean, unit variance per channel.
    pub fn normalization(&self) -> Normalization {
        Normalization::new()
            .with_mean(self.channel_mean)
            .with_std(self.channel_stddev.map(|s| if s > 0.0 { s } else { 1.0 }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logger_installs_once() {
        init_logger();
        init_logger();
        assert!(log::max_level() >= log::LevelFilter::Info);
    }

    fn filled(values: [f32; 3]) -> Image {
        [[values; 32]; 32]
    }

    #[test]
    fn stats_per_channel() {
        let stats = Stats::from_iter(
            [filled([0.0, 0.5, 1.0]), filled([1.0, 0.5, 1.0])].into_iter(),
        );

        assert_eq!(stats.count, 2);
        assert_eq!(stats.dim, [32, 32, 3]);
        assert_eq!(stats.value_range, [0.0, 1.0]);
        assert_eq!(stats.channel_mean, [0.5, 0.5, 1.0]);
        assert_eq!(stats.channel_stddev, [0.5, 0.0, 0.0]);

        let normalization = stats.normalization();
        assert_eq!(normalization.mean, [0.5, 0.5, 1.0]);
        assert_eq!(normalization.std, [0.5, 1.0, 1.0]);
    }

    #[test]
    fn stats_of_nothing() {
        let stats = Stats::from_iter(std::iter::empty());
        assert_eq!(stats.count, 0);
        assert_eq!(stats.value_range, [0.0, 0.0]);
        assert_eq!(stats.mean, 0.0);
    }

    #[test]
    fn image_round_trips_through_png_buffer() {
        let mut img = filled([0.0, 0.0, 0.0]);
        img[3][5] = [1.0, 0.2, 0.6];
        let rgb = buffer_to_image(&img).to_rgb8();

        assert_eq!(rgb.dimensions(), (32, 32));
        assert_eq!(rgb.get_pixel(5, 3).0, [255, 51, 153]);
        assert_eq!(rgb.get_pixel(3, 5).0, [0, 0, 0]);
    }
}
