/// Size of one WebAssembly page in bytes
pub const WASM_PAGE_SIZE: u64 = 65_536;
/// Maximum allowed size for guest binaries (16 MB)
pub const MAX_MODULE_SIZE: usize = 16 * 1024 * 1024;

/// Shared memory page count for the add demo
pub const ADD_DEMO_PAGES: u32 = 2;
/// Shared memory page count for the Perlin demo
pub const PERLIN_DEMO_PAGES: u32 = 14;
/// Shared memory page count for the game demo
pub const GAME_DEMO_PAGES: u32 = 18;

/// Canvas width in device pixels
pub const DEFAULT_CANVAS_WIDTH: u32 = 500;
/// Canvas height in device pixels
pub const DEFAULT_CANVAS_HEIGHT: u32 = 500;

/// Bytes read back by the add demo at `getBufferPointer`
pub const ADD_REGION_LEN: u64 = 16;
/// Length of the shared key buffer window
pub const KEY_BUFFER_LEN: usize = 32;

/// Polling presenter interval (1 second)
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
/// Frame period for the frame driver (~60 Hz)
pub const DEFAULT_FRAME_PERIOD_MS: u64 = 16;

/// Export names of the guest ABI
pub mod exports {
    pub const ADD: &str = "add";
    pub const GET_BUFFER_POINTER: &str = "getBufferPointer";
    pub const COMPUTE_BUFFER: &str = "computeBuffer";
    pub const COMPUTE_PERLIN: &str = "computePerlin";
    pub const SET_SEED: &str = "setSeed";
    pub const INIT: &str = "init";
    pub const UPDATE: &str = "update";
    pub const KEYBOARD: &str = "keyboard";
    pub const REGISTER_KEYPRESS: &str = "register_keypress";
    pub const KEYBOARD_OFFSET: &str = "keyboard_offset";
}

/// Import module name for the host environment
pub const ENV_MODULE: &str = "env";
/// Import name of the shared memory
pub const ENV_MEMORY: &str = "memory";

/// Fuel granted to each guest call (500 million instructions)
pub const CALL_FUEL: u64 = 500_000_000;
