//! 核心宏定义

/// 为配置结构体实现 `Default` 的宏
///
/// 配置结构体字段较多，且都需要 `#[serde(default)]`，用宏集中列出默认值。
///
/// ```rust
/// use particle_engine::impl_default;
///
/// struct BurstPreview {
///     count: u32,
///     interval: f32,
/// }
///
/// impl_default!(BurstPreview {
///     count: 30,
///     interval: 0.01,
/// });
///
/// assert_eq!(BurstPreview::default().count, 30);
/// ```
#[macro_export]
macro_rules! impl_default {
    ($struct_name:ident {
        $($field:ident: $value:expr),* $(,)?
    }) => {
        impl Default for $struct_name {
            fn default() -> Self {
                Self {
                    $($field: $value),*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    struct EmitterDefaults {
        rate: f32,
        label: String,
    }

    impl_default!(EmitterDefaults {
        rate: 10.0,
        label: "default".to_string(),
    });

    #[test]
    fn test_impl_default() {
        let defaults = EmitterDefaults::default();
        assert_eq!(defaults.rate, 10.0);
        assert_eq!(defaults.label, "default");
    }
}
