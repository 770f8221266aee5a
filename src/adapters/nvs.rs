//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the whole [`SystemConfig`] is one
//! postcard-encoded blob under `tam110/syscfg`.
//!
//! - Config validation: every field is range-checked before persistence.
//! - Atomic writes: ESP-IDF NVS commits are atomic per `nvs_commit()`.
//! - The simulation backend keeps the blob in memory (dev/test only).

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::SystemConfig;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
const CONFIG_NAMESPACE: &[u8] = b"tam110\0";
#[cfg(target_os = "espidf")]
const CONFIG_KEY: &[u8] = b"syscfg\0";
const MAX_BLOB_SIZE: usize = 1024;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    blob: Option<Vec<u8>>,
}

impl NvsAdapter {
    /// Initialise NVS flash.
    ///
    /// On first boot or after a version mismatch the partition is erased
    /// and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called from the main task before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES as i32 || ret == ESP_ERR_NVS_NEW_VERSION_FOUND as i32
            {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK as i32 {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK as i32 {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            blob: None,
        })
    }

    /// Stored config if present and valid, defaults otherwise.  Never fails:
    /// a corrupt or out-of-range blob must not keep the device from booting.
    pub fn load_or_default(&self) -> SystemConfig {
        match self.load().and_then(|cfg| cfg.validate().map(|()| cfg)) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!("NvsAdapter: {}, using defaults", e);
                SystemConfig::default()
            }
        }
    }

    /// Simulation: overwrite the stored blob with arbitrary bytes.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_write_raw(&mut self, bytes: &[u8]) {
        self.blob = Some(bytes.to_vec());
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(CONFIG_NAMESPACE.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK as i32 {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn platform_read(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        let result = Self::with_nvs_handle(false, |handle| {
            let mut size: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr().cast(),
                    core::ptr::null_mut(),
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            if size == 0 || size > MAX_BLOB_SIZE {
                return Err(ESP_ERR_NVS_INVALID_LENGTH as i32);
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(
                    handle,
                    CONFIG_KEY.as_ptr().cast(),
                    buf.as_mut_ptr().cast(),
                    &mut size,
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            buf.truncate(size);
            Ok(buf)
        });

        match result {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND as i32 => Ok(None),
            Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH as i32 => Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsAdapter: NVS read error {}", e);
                Err(ConfigError::IoError)
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_read(&self) -> Result<Option<Vec<u8>>, ConfigError> {
        match &self.blob {
            Some(bytes) if bytes.is_empty() || bytes.len() > MAX_BLOB_SIZE => {
                Err(ConfigError::Corrupted)
            }
            other => Ok(other.clone()),
        }
    }

    #[cfg(target_os = "espidf")]
    fn platform_write(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        Self::with_nvs_handle(true, |handle| {
            let ret = unsafe {
                nvs_set_blob(
                    handle,
                    CONFIG_KEY.as_ptr().cast(),
                    bytes.as_ptr().cast(),
                    bytes.len(),
                )
            };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(handle) };
            if ret != ESP_OK as i32 {
                return Err(ret);
            }
            Ok(())
        })
        .map_err(|e| {
            warn!("NvsAdapter: NVS write error {}", e);
            ConfigError::IoError
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_write(&mut self, bytes: &[u8]) -> Result<(), ConfigError> {
        self.blob = Some(bytes.to_vec());
        Ok(())
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        match self.platform_read()? {
            Some(bytes) => {
                let cfg: SystemConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
                Ok(cfg)
            }
            None => {
                info!("NvsAdapter: no stored config, using defaults");
                Ok(SystemConfig::default())
            }
        }
    }

    fn save(&mut self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::IoError);
        }
        self.platform_write(&bytes)?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}
