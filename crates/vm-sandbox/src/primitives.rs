pub use revm::{
    Journal,
    context::{
        BlockEnv,
        CfgEnv,
        TxEnv,
        result::{
            EVMError,
            ExecutionResult,
            Output,
            ResultAndState,
        },
    },
    context_interface::block::BlobExcessGasAndPrice,
    primitives::{
        Address,
        B256,
        Bytes,
        FixedBytes,
        KECCAK_EMPTY,
        Log,
        StorageKey,
        StorageValue,
        TxKind,
        U256,
        address,
        bytes,
        fixed_bytes,
        hardfork::SpecId,
        hex,
        keccak256,
        uint,
    },
    state::{
        Account,
        AccountInfo,
        AccountStatus,
        Bytecode,
        EvmState,
        EvmStorageSlot,
    },
};
