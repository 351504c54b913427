mod encrypted_fs_store;

pub use encrypted_fs_store::EncryptedFsStore;
