/// Shorthand for square-kernel convolution configs.
///
/// Defaults to burn's `Conv2dConfig`; any config type exposing the same
/// `new([c_in, c_out], [k, k])` / `with_padding` / `with_stride` / `with_bias`
/// builder can be named with a leading `Type:`.
#[macro_export]
macro_rules! conv_2d {
        ({$builder:expr}$(,)?) => {
            $builder
        };

        ({$builder:expr} , padding=$padding:expr $(, $($rest:tt)*)?) => {
            $crate::conv_2d!({ $builder.with_padding(burn::nn::PaddingConfig2d::Explicit($padding, $padding)) } $(, $($rest)*)?)
        };

        ({$builder:expr} , stride=$stride:expr $(, $($rest:tt)*)?) => {
            $crate::conv_2d!({ $builder.with_stride([$stride, $stride])} $(, $($rest)*)?)
        };

        ({$builder:expr} , bias=$bias:expr $(, $($rest:tt)*)?) => {
            $crate::conv_2d!({ $builder.with_bias($bias)} $(, $($rest)*)?)
        };

        ($config:ident : $c_in:expr, $c_out:expr, kernel_size = $kernel_size:expr $(, $($rest:tt)*)?) => {
            $crate::conv_2d!({$config::new([$c_in, $c_out], [$kernel_size, $kernel_size])} $(, $($rest)*)?)
        };

        ($c_in:expr, $c_out:expr, kernel_size = $kernel_size:expr $(, $($rest:tt)*)?) => {
            $crate::conv_2d!({burn::nn::conv::Conv2dConfig::new([$c_in, $c_out], [$kernel_size, $kernel_size])} $(, $($rest)*)?)
        };
    }
