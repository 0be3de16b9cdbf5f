//! Compatibility layer for non-Linux builds.

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(any(
        target_os = "linux",
        target_os = "l4re",
        target_os = "android",
        target_os = "emscripten"
    ))] {
        pub(crate) use libc::{
            input_absinfo, input_event, input_id, ABS_CNT, EV_CNT, FF_CNT, INPUT_PROP_CNT,
            KEY_CNT, LED_CNT, MSC_CNT, REL_CNT, SND_CNT, SW_CNT,
        };
    } else {
        mod non_linux;
        pub(crate) use non_linux::{
            input_absinfo, input_event, input_id, ABS_CNT, EV_CNT, FF_CNT, INPUT_PROP_CNT,
            KEY_CNT, LED_CNT, MSC_CNT, REL_CNT, SND_CNT, SW_CNT,
        };
    }
}
