//! Print configuration and order creation requests

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Print Options
// ============================================================================

/// 色彩模式
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColorMode {
    /// 黑白
    Bw,
    /// 彩色
    Color,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Bw => "BW",
            ColorMode::Color => "COLOR",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ColorMode::Bw => "黑白",
            ColorMode::Color => "彩色",
        }
    }
}

/// 单双面
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Duplex {
    /// 单面
    Single,
    /// 双面
    Double,
}

impl Duplex {
    pub fn as_str(&self) -> &'static str {
        match self {
            Duplex::Single => "SINGLE",
            Duplex::Double => "DOUBLE",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Duplex::Single => "单面",
            Duplex::Double => "双面",
        }
    }
}

/// 纸张尺寸
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaperSize {
    A3,
    A4,
    A5,
    B5,
    Letter,
}

impl PaperSize {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaperSize::A3 => "A3",
            PaperSize::A4 => "A4",
            PaperSize::A5 => "A5",
            PaperSize::B5 => "B5",
            PaperSize::Letter => "LETTER",
        }
    }
}

/// Unknown symbolic value for one of the print option enums
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct ParseOptionError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for ColorMode {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BW" | "BLACK_WHITE" => Ok(ColorMode::Bw),
            "COLOR" | "COLOUR" => Ok(ColorMode::Color),
            _ => Err(ParseOptionError {
                kind: "color mode",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for Duplex {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SINGLE" => Ok(Duplex::Single),
            "DOUBLE" => Ok(Duplex::Double),
            _ => Err(ParseOptionError {
                kind: "duplex",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for PaperSize {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A3" => Ok(PaperSize::A3),
            "A4" => Ok(PaperSize::A4),
            "A5" => Ok(PaperSize::A5),
            "B5" => Ok(PaperSize::B5),
            "LETTER" => Ok(PaperSize::Letter),
            _ => Err(ParseOptionError {
                kind: "paper size",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Duplex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Print Configuration
// ============================================================================

/// 打印配置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PrintConfig {
    /// 份数 (≥1)
    pub copies: u32,
    pub color_mode: ColorMode,
    pub duplex: Duplex,
    pub paper_size: PaperSize,
}

/// 创建订单请求 (canonical shape)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub user_id: String,
    /// 文件存储服务持有的文件引用
    pub file_ref: String,
    pub print_config: PrintConfig,
    /// 计费页数 (≥1，上传时解析或由客户端估算)
    pub page_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
}

impl CreateOrderRequest {
    /// Structural validation; pricing is checked separately.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.user_id.trim().is_empty() {
            return Err(AppError::validation("userId must not be empty").with_detail("field", "userId"));
        }
        if self.file_ref.trim().is_empty() {
            return Err(AppError::validation("fileRef must not be empty").with_detail("field", "fileRef"));
        }
        if self.print_config.copies < 1 {
            return Err(AppError::validation("copies must be at least 1").with_detail("field", "copies"));
        }
        if self.page_count < 1 {
            return Err(
                AppError::validation("pageCount must be at least 1").with_detail("field", "pageCount")
            );
        }
        Ok(())
    }
}

// ============================================================================
// Legacy Request Shape
// ============================================================================

/// Legacy flat create request (`isColor` / `isDoubleSide` booleans)
///
/// Deprecated input adapter: only converted into [`CreateOrderRequest`].
/// Any client-side `amount` in the payload is ignored, the engine always
/// prices the order itself.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyOrderRequest {
    pub user_id: String,
    pub file_id: Option<String>,
    pub copies: Option<u32>,
    pub actual_pages: Option<u32>,
    pub is_color: Option<bool>,
    pub is_double_side: Option<bool>,
    pub paper_size: Option<String>,
    pub remark: Option<String>,
}

impl TryFrom<LegacyOrderRequest> for CreateOrderRequest {
    type Error = AppError;

    fn try_from(legacy: LegacyOrderRequest) -> Result<Self, Self::Error> {
        let file_ref = legacy
            .file_id
            .filter(|f| !f.trim().is_empty())
            .ok_or_else(|| AppError::validation("fileId is required").with_detail("field", "fileId"))?;
        let page_count = legacy.actual_pages.ok_or_else(|| {
            AppError::validation("actualPages is required").with_detail("field", "actualPages")
        })?;
        let paper_size = match legacy.paper_size.as_deref() {
            Some(s) => s
                .parse::<PaperSize>()
                .map_err(|e| AppError::validation(e.to_string()).with_detail("field", "paperSize"))?,
            None => PaperSize::A4,
        };

        let request = CreateOrderRequest {
            user_id: legacy.user_id,
            file_ref,
            print_config: PrintConfig {
                copies: legacy.copies.unwrap_or(1),
                color_mode: if legacy.is_color.unwrap_or(false) {
                    ColorMode::Color
                } else {
                    ColorMode::Bw
                },
                duplex: if legacy.is_double_side.unwrap_or(false) {
                    Duplex::Double
                } else {
                    Duplex::Single
                },
                paper_size,
            },
            page_count,
            remark: legacy.remark,
        };
        request.validate()?;
        Ok(request)
    }
}
