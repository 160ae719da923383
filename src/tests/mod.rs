mod data_tests;
