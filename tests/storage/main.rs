mod bucket_test;
mod concurrency_test;
