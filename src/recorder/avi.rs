//! Motion-JPEG AVI 写入器
//!
//! 头部以占位值写出, `finish` 时回填帧数/大小并追加 idx1 索引.
//! 未显式 `finish` 的写入器在析构时补写, 保证异常退出后文件仍可播放.

use std::io::{Cursor, Seek, SeekFrom, Write};

use anyhow::{bail, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;
use tracing::warn;

use super::session::FrameSink;

// 固定头部中需要回填的位置
const RIFF_SIZE_POS: u64 = 4;
const AVIH_MAX_BYTES_POS: u64 = 36;
const AVIH_TOTAL_FRAMES_POS: u64 = 48;
const AVIH_BUFFER_SIZE_POS: u64 = 60;
const STRH_LENGTH_POS: u64 = 140;
const STRH_BUFFER_SIZE_POS: u64 = 144;
const MOVI_SIZE_POS: u64 = 216;
const MOVI_FOURCC_POS: u64 = 220;
const HEADER_LEN: u64 = 224;

/// RIFF 大小字段是 u32, 整个文件不能超过 4 GiB + 8
const MAX_RIFF_SIZE: u64 = u32::MAX as u64;
const INDEX_ENTRY_LEN: u64 = 16;

const AVIF_HASINDEX: u32 = 0x10;
const AVIIF_KEYFRAME: u32 = 0x10;

struct IndexEntry {
    offset: u32,
    size: u32,
}

pub struct MjpegAviWriter<W: Write + Seek> {
    out: Option<W>,
    width: u32,
    height: u32,
    fps: u32,
    quality: u8,
    position: u64,
    max_chunk: u32,
    index: Vec<IndexEntry>,
}

impl<W: Write + Seek> MjpegAviWriter<W> {
    pub fn new(mut out: W, width: u32, height: u32, fps: u32, quality: u8) -> Result<Self> {
        if width == 0 || height == 0 || fps == 0 {
            bail!("无效的录像规格 {}x{} @ {}fps", width, height, fps);
        }
        // strh 帧矩形和 JPEG 都只支持 16 位尺寸
        let (Ok(w16), Ok(h16)) = (u16::try_from(width), u16::try_from(height)) else {
            bail!("录像尺寸 {}x{} 超出 65535", width, height);
        };
        let Some(image_size) = width.checked_mul(height).and_then(|n| n.checked_mul(3)) else {
            bail!("录像尺寸 {}x{} 过大", width, height);
        };
        write_header(&mut out, width, height, w16, h16, image_size, fps)?;
        Ok(Self {
            out: Some(out),
            width,
            height,
            fps,
            quality,
            position: HEADER_LEN,
            max_chunk: 0,
            index: Vec::new(),
        })
    }

    /// 写入尾部并交还底层写入器
    pub fn into_inner(mut self) -> Result<W> {
        self.finalize()?;
        match self.out.take() {
            Some(out) => Ok(out),
            None => bail!("写入器已关闭"),
        }
    }

    fn finalize(&mut self) -> Result<()> {
        let Some(out) = self.out.as_mut() else {
            return Ok(());
        };

        let movi_end = self.position;

        // idx1
        let index_len = self.index.len() as u64 * INDEX_ENTRY_LEN;
        let file_end = movi_end + 8 + index_len;
        let riff_size = u32::try_from(file_end - 8).context("录像文件超出 AVI 大小上限")?;
        let movi_size = u32::try_from(movi_end - MOVI_FOURCC_POS)?;

        out.write_all(b"idx1")?;
        put_u32(out, u32::try_from(index_len)?)?;
        for entry in &self.index {
            out.write_all(b"00dc")?;
            put_u32(out, AVIIF_KEYFRAME)?;
            put_u32(out, entry.offset)?;
            put_u32(out, entry.size)?;
        }

        let frames = self.index.len() as u32;
        let max_bytes = self.max_chunk.saturating_mul(self.fps);

        patch_u32(out, RIFF_SIZE_POS, riff_size)?;
        patch_u32(out, AVIH_MAX_BYTES_POS, max_bytes)?;
        patch_u32(out, AVIH_TOTAL_FRAMES_POS, frames)?;
        patch_u32(out, AVIH_BUFFER_SIZE_POS, self.max_chunk)?;
        patch_u32(out, STRH_LENGTH_POS, frames)?;
        patch_u32(out, STRH_BUFFER_SIZE_POS, self.max_chunk)?;
        patch_u32(out, MOVI_SIZE_POS, movi_size)?;

        out.seek(SeekFrom::Start(file_end))?;
        out.flush()?;
        Ok(())
    }
}

impl<W: Write + Seek> FrameSink for MjpegAviWriter<W> {
    fn write_frame(&mut self, image: &RgbImage) -> Result<()> {
        if image.dimensions() != (self.width, self.height) {
            bail!(
                "帧尺寸 {:?} 与录像尺寸 {}x{} 不符",
                image.dimensions(),
                self.width,
                self.height
            );
        }
        let Some(out) = self.out.as_mut() else {
            bail!("写入器已关闭");
        };

        // 先完整编码再写入, 编码失败不会留下半个块
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode_image(image)?;

        // 块 + 填充 + 新索引项 + idx1 头都要放得下, 否则丢弃该帧
        let chunk_len = 8 + jpeg.len() as u64 + jpeg.len() as u64 % 2;
        let projected_end =
            self.position + chunk_len + 8 + (self.index.len() as u64 + 1) * INDEX_ENTRY_LEN;
        if projected_end - 8 > MAX_RIFF_SIZE {
            bail!("录像文件已达 AVI 大小上限 (4 GiB), 丢弃帧");
        }
        let size = jpeg.len() as u32;
        let offset = u32::try_from(self.position - MOVI_FOURCC_POS)?;

        out.write_all(b"00dc")?;
        put_u32(out, size)?;
        out.write_all(&jpeg)?;
        if jpeg.len() % 2 == 1 {
            out.write_all(&[0])?;
        }

        self.position += chunk_len;
        self.max_chunk = self.max_chunk.max(size);
        self.index.push(IndexEntry { offset, size });
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let result = self.finalize();
        self.out = None;
        result
    }

    fn frames_written(&self) -> u64 {
        self.index.len() as u64
    }
}

impl<W: Write + Seek> Drop for MjpegAviWriter<W> {
    fn drop(&mut self) {
        if self.out.is_some() {
            if let Err(e) = self.finalize() {
                warn!("⚠️ 录像文件补写尾部失败: {:#}", e);
            }
        }
    }
}

fn put_u32<W: Write>(out: &mut W, value: u32) -> std::io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn put_u16<W: Write>(out: &mut W, value: u16) -> std::io::Result<()> {
    out.write_all(&value.to_le_bytes())
}

fn patch_u32<W: Write + Seek>(out: &mut W, pos: u64, value: u32) -> std::io::Result<()> {
    out.seek(SeekFrom::Start(pos))?;
    put_u32(out, value)
}

fn write_header<W: Write>(
    out: &mut W,
    width: u32,
    height: u32,
    frame_w: u16,
    frame_h: u16,
    image_size: u32,
    fps: u32,
) -> std::io::Result<()> {
    // 先在内存里拼好, 一次写出
    let mut h = Cursor::new(Vec::with_capacity(HEADER_LEN as usize));

    h.write_all(b"RIFF")?;
    put_u32(&mut h, 0)?; // riff size
    h.write_all(b"AVI ")?;

    h.write_all(b"LIST")?;
    put_u32(&mut h, 192)?; // hdrl size
    h.write_all(b"hdrl")?;

    // MainAVIHeader
    h.write_all(b"avih")?;
    put_u32(&mut h, 56)?;
    put_u32(&mut h, 1_000_000 / fps)?; // us per frame
    put_u32(&mut h, 0)?; // max bytes per sec
    put_u32(&mut h, 0)?; // padding granularity
    put_u32(&mut h, AVIF_HASINDEX)?;
    put_u32(&mut h, 0)?; // total frames
    put_u32(&mut h, 0)?; // initial frames
    put_u32(&mut h, 1)?; // streams
    put_u32(&mut h, 0)?; // suggested buffer size
    put_u32(&mut h, width)?;
    put_u32(&mut h, height)?;
    for _ in 0..4 {
        put_u32(&mut h, 0)?;
    }

    h.write_all(b"LIST")?;
    put_u32(&mut h, 116)?; // strl size
    h.write_all(b"strl")?;

    // AVIStreamHeader
    h.write_all(b"strh")?;
    put_u32(&mut h, 56)?;
    h.write_all(b"vids")?;
    h.write_all(b"MJPG")?;
    put_u32(&mut h, 0)?; // flags
    put_u16(&mut h, 0)?; // priority
    put_u16(&mut h, 0)?; // language
    put_u32(&mut h, 0)?; // initial frames
    put_u32(&mut h, 1)?; // scale
    put_u32(&mut h, fps)?; // rate
    put_u32(&mut h, 0)?; // start
    put_u32(&mut h, 0)?; // length
    put_u32(&mut h, 0)?; // suggested buffer size
    put_u32(&mut h, u32::MAX)?; // quality
    put_u32(&mut h, 0)?; // sample size
    put_u16(&mut h, 0)?;
    put_u16(&mut h, 0)?;
    put_u16(&mut h, frame_w)?;
    put_u16(&mut h, frame_h)?;

    // BITMAPINFOHEADER
    h.write_all(b"strf")?;
    put_u32(&mut h, 40)?;
    put_u32(&mut h, 40)?;
    put_u32(&mut h, width)?;
    put_u32(&mut h, height)?;
    put_u16(&mut h, 1)?; // planes
    put_u16(&mut h, 24)?; // bit count
    h.write_all(b"MJPG")?;
    put_u32(&mut h, image_size)?;
    for _ in 0..4 {
        put_u32(&mut h, 0)?;
    }

    h.write_all(b"LIST")?;
    put_u32(&mut h, 4)?; // movi size
    h.write_all(b"movi")?;

    debug_assert_eq!(h.get_ref().len() as u64, HEADER_LEN);
    out.write_all(h.get_ref())
}
