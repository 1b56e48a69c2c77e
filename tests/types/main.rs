mod chunk_test;
