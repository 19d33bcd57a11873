pub mod delimited;
pub mod parquet;

pub use self::delimited::{ChunkedReader, DelimitedOptions, read_frame};
pub use self::parquet::{
    ParquetPartitionWriter, joined_schema, list_partitions, partition_file_name, read_parquet_vec,
    read_partition, year_dir,
};
